use log::debug;

use crate::models::{CheckDigitReport, DocumentFormat, MrzFields, Sex};
use crate::validation::checksum;

/// Decoder for the three ICAO Doc 9303 travel-document layouts.
///
/// Column maps (0-based, end exclusive):
///
/// TD3 (2 x 44, passports)
///   line 1: 0..2 document code, 2..5 issuing state, 5..44 name
///   line 2: 0..9 number, 9 check, 10..13 nationality, 13..19 birth,
///           19 check, 20 sex, 21..27 expiry, 27 check, 28..42 personal
///           number, 42 check, 43 composite over 0..10 + 13..20 + 21..43
///
/// TD2 (2 x 36)
///   line 1: 0..2 document code, 2..5 issuing state, 5..36 name
///   line 2: 0..9 number, 9 check, 10..13 nationality, 13..19 birth,
///           19 check, 20 sex, 21..27 expiry, 27 check, 28..35 optional,
///           35 composite over 0..10 + 13..20 + 21..35
///
/// TD1 (3 x 30)
///   line 1: 0..2 document code, 2..5 issuing state, 5..14 number,
///           14 check, 15..30 optional
///   line 2: 0..6 birth, 6 check, 7 sex, 8..14 expiry, 14 check,
///           15..18 nationality, 18..29 optional, 29 composite over
///           line1 5..30 + line2 0..7 + 8..15 + 18..29
///   line 3: 0..30 name
pub struct MrzParser;

impl MrzParser {
    /// Decode a candidate window. Never panics and never errors: input
    /// that matches no known shape, or fails any check digit, comes back
    /// with `valid == false` and whatever fields could still be read.
    pub fn parse(lines: &[String]) -> MrzFields {
        let format = match Self::detect_format(lines) {
            Some(format) => format,
            None => {
                debug!(
                    "candidate window does not match any document shape ({} lines)",
                    lines.len()
                );
                return MrzFields::invalid(None);
            }
        };
        // Slicing below is positional; anything outside the MRZ alphabet
        // means the window is not trustworthy column-for-column.
        if lines
            .iter()
            .any(|line| !line.chars().all(Self::is_mrz_char))
        {
            return MrzFields::invalid(Some(format));
        }
        match format {
            DocumentFormat::TD1 => Self::parse_td1(lines),
            DocumentFormat::TD2 => Self::parse_td2(lines),
            DocumentFormat::TD3 => Self::parse_td3(lines),
        }
    }

    /// Convenience entry point for newline-joined zones.
    pub fn parse_text(text: &str) -> MrzFields {
        let lines: Vec<String> = text
            .lines()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect();
        Self::parse(&lines)
    }

    fn detect_format(lines: &[String]) -> Option<DocumentFormat> {
        let all_len = |n: usize| lines.iter().all(|l| l.len() == n);
        match lines.len() {
            3 if all_len(30) => Some(DocumentFormat::TD1),
            2 if all_len(36) => Some(DocumentFormat::TD2),
            2 if all_len(44) => Some(DocumentFormat::TD3),
            _ => None,
        }
    }

    fn is_mrz_char(c: char) -> bool {
        c.is_ascii_uppercase() || c.is_ascii_digit() || c == '<'
    }

    fn parse_td3(lines: &[String]) -> MrzFields {
        let l1 = &lines[0];
        let l2 = &lines[1];

        let number_field = &l2[0..9];
        let birth = &l2[13..19];
        let sex_char = Self::char_at(l2, 20);
        let expiry = &l2[21..27];
        let personal_field = &l2[28..42];
        let personal_check = Self::char_at(l2, 42);
        let composite_field = format!("{}{}{}", &l2[0..10], &l2[13..20], &l2[21..43]);

        // An absent personal number may carry '<' instead of a computed
        // digit; both are accepted for an all-filler field.
        let personal_trimmed = personal_field.trim_end_matches('<');
        let personal_ok = checksum::verify(personal_field, personal_check)
            || (personal_trimmed.is_empty() && personal_check == '<');

        let checks = CheckDigitReport {
            document_number: checksum::verify(number_field, Self::char_at(l2, 9)),
            birth_date: checksum::verify(birth, Self::char_at(l2, 19)),
            expiry_date: checksum::verify(expiry, Self::char_at(l2, 27)),
            personal_number: Some(personal_ok),
            composite: checksum::verify(&composite_field, Self::char_at(l2, 43)),
            fields_legal: Self::alpha_filler(&l1[0..2])
                && Self::alpha_filler(&l1[2..5])
                && Self::alpha_filler(&l1[5..44])
                && Self::alpha_filler(&l2[10..13])
                && Self::date_chars(birth)
                && Self::date_chars(expiry)
                && matches!(sex_char, 'M' | 'F' | '<'),
        };

        let (surname, given_names) = Self::split_name(&l1[5..44]);
        let valid = checks.all_passed();
        MrzFields {
            document_format: Some(DocumentFormat::TD3),
            document_type: l1[0..2].trim_end_matches('<').to_string(),
            issuing_country: l1[2..5].to_string(),
            surname,
            given_names,
            document_number: number_field.trim_end_matches('<').to_string(),
            nationality: l2[10..13].to_string(),
            birth_date: birth.to_string(),
            sex: Sex::from_mrz_char(sex_char),
            expiry_date: expiry.to_string(),
            personal_number: Self::optional_field(personal_field),
            optional_data: None,
            checks,
            valid,
        }
    }

    fn parse_td2(lines: &[String]) -> MrzFields {
        let l1 = &lines[0];
        let l2 = &lines[1];

        let number_field = &l2[0..9];
        let birth = &l2[13..19];
        let sex_char = Self::char_at(l2, 20);
        let expiry = &l2[21..27];
        let composite_field = format!("{}{}{}", &l2[0..10], &l2[13..20], &l2[21..35]);

        let checks = CheckDigitReport {
            document_number: checksum::verify(number_field, Self::char_at(l2, 9)),
            birth_date: checksum::verify(birth, Self::char_at(l2, 19)),
            expiry_date: checksum::verify(expiry, Self::char_at(l2, 27)),
            personal_number: None,
            composite: checksum::verify(&composite_field, Self::char_at(l2, 35)),
            fields_legal: Self::alpha_filler(&l1[0..2])
                && Self::alpha_filler(&l1[2..5])
                && Self::alpha_filler(&l1[5..36])
                && Self::alpha_filler(&l2[10..13])
                && Self::date_chars(birth)
                && Self::date_chars(expiry)
                && matches!(sex_char, 'M' | 'F' | '<'),
        };

        let (surname, given_names) = Self::split_name(&l1[5..36]);
        let valid = checks.all_passed();
        MrzFields {
            document_format: Some(DocumentFormat::TD2),
            document_type: l1[0..2].trim_end_matches('<').to_string(),
            issuing_country: l1[2..5].to_string(),
            surname,
            given_names,
            document_number: number_field.trim_end_matches('<').to_string(),
            nationality: l2[10..13].to_string(),
            birth_date: birth.to_string(),
            sex: Sex::from_mrz_char(sex_char),
            expiry_date: expiry.to_string(),
            personal_number: Self::optional_field(&l2[28..35]),
            optional_data: None,
            checks,
            valid,
        }
    }

    fn parse_td1(lines: &[String]) -> MrzFields {
        let l1 = &lines[0];
        let l2 = &lines[1];
        let l3 = &lines[2];

        let number_field = &l1[5..14];
        let birth = &l2[0..6];
        let sex_char = Self::char_at(l2, 7);
        let expiry = &l2[8..14];
        let composite_field = format!(
            "{}{}{}{}",
            &l1[5..30],
            &l2[0..7],
            &l2[8..15],
            &l2[18..29]
        );

        let checks = CheckDigitReport {
            document_number: checksum::verify(number_field, Self::char_at(l1, 14)),
            birth_date: checksum::verify(birth, Self::char_at(l2, 6)),
            expiry_date: checksum::verify(expiry, Self::char_at(l2, 14)),
            personal_number: None,
            composite: checksum::verify(&composite_field, Self::char_at(l2, 29)),
            fields_legal: Self::alpha_filler(&l1[0..2])
                && Self::alpha_filler(&l1[2..5])
                && Self::alpha_filler(&l2[15..18])
                && Self::alpha_filler(l3)
                && Self::date_chars(birth)
                && Self::date_chars(expiry)
                && matches!(sex_char, 'M' | 'F' | '<'),
        };

        let (surname, given_names) = Self::split_name(l3);
        let valid = checks.all_passed();
        MrzFields {
            document_format: Some(DocumentFormat::TD1),
            document_type: l1[0..2].trim_end_matches('<').to_string(),
            issuing_country: l1[2..5].to_string(),
            surname,
            given_names,
            document_number: number_field.trim_end_matches('<').to_string(),
            nationality: l2[15..18].to_string(),
            birth_date: birth.to_string(),
            sex: Sex::from_mrz_char(sex_char),
            expiry_date: expiry.to_string(),
            personal_number: Self::optional_field(&l1[15..30]),
            optional_data: Self::optional_field(&l2[18..29]),
            checks,
            valid,
        }
    }

    // Lines are pure ASCII by the time we index into them.
    fn char_at(line: &str, index: usize) -> char {
        line.as_bytes()[index] as char
    }

    fn alpha_filler(field: &str) -> bool {
        field.chars().all(|c| c.is_ascii_uppercase() || c == '<')
    }

    fn date_chars(field: &str) -> bool {
        field.chars().all(|c| c.is_ascii_digit() || c == '<')
    }

    /// Split the name field into primary and secondary identifiers.
    /// `<<` separates surname from given names, single `<` separates
    /// words inside each.
    fn split_name(field: &str) -> (String, String) {
        let trimmed = field.trim_end_matches('<');
        match trimmed.split_once("<<") {
            Some((primary, secondary)) => (
                primary.replace('<', " ").trim().to_string(),
                secondary.replace('<', " ").trim().to_string(),
            ),
            None => (trimmed.replace('<', " ").trim().to_string(), String::new()),
        }
    }

    fn optional_field(field: &str) -> Option<String> {
        let trimmed = field.trim_end_matches('<');
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.replace('<', " ").trim().to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::checksum::check_digit;

    fn cd(field: &str) -> char {
        char::from_digit(check_digit(field).unwrap() as u32, 10).unwrap()
    }

    fn pad(s: &str, len: usize) -> String {
        let mut out = s.to_string();
        while out.len() < len {
            out.push('<');
        }
        out
    }

    fn sample_td3() -> Vec<String> {
        let l1 = pad("P<UTOMUSTERMANN<<ERIKA", 44);
        let number = "C01X00T47";
        let birth = "740812";
        let expiry = "120415";
        let personal = "<<<<<<<<<<<<<<";
        let mut l2 = format!(
            "{}{}UTO{}{}F{}{}{}{}",
            number,
            cd(number),
            birth,
            cd(birth),
            expiry,
            cd(expiry),
            personal,
            cd(personal)
        );
        let composite = format!("{}{}{}", &l2[0..10], &l2[13..20], &l2[21..43]);
        l2.push(cd(&composite));
        assert_eq!(l2.len(), 44);
        vec![l1, l2]
    }

    fn sample_td2() -> Vec<String> {
        let l1 = pad("I<UTOMUSTERMANN<<ERIKA", 36);
        let number = "D23145890";
        let head = format!(
            "{}{}UTO{}{}F{}{}{}",
            number,
            cd(number),
            "740812",
            cd("740812"),
            "120415",
            cd("120415"),
            "<<<<<<<"
        );
        let composite = format!("{}{}{}", &head[0..10], &head[13..20], &head[21..35]);
        let l2 = format!("{}{}", head, cd(&composite));
        assert_eq!(l2.len(), 36);
        vec![l1, l2]
    }

    fn sample_td1() -> Vec<String> {
        let number = "D23145890";
        let l1 = format!("I<UTO{}{}{}", number, cd(number), "<".repeat(15));
        assert_eq!(l1.len(), 30);
        let head = format!(
            "{}{}F{}{}UTO{}",
            "740812",
            cd("740812"),
            "120415",
            cd("120415"),
            "<".repeat(11)
        );
        let composite = format!(
            "{}{}{}{}",
            &l1[5..30],
            &head[0..7],
            &head[8..15],
            &head[18..29]
        );
        let l2 = format!("{}{}", head, cd(&composite));
        assert_eq!(l2.len(), 30);
        let l3 = pad("MUSTERMANN<<ERIKA", 30);
        vec![l1, l2, l3]
    }

    #[test]
    fn td3_round_trip() {
        let fields = MrzParser::parse(&sample_td3());
        assert!(fields.valid, "checks: {:?}", fields.checks);
        assert_eq!(fields.document_format, Some(DocumentFormat::TD3));
        assert_eq!(fields.document_type, "P");
        assert_eq!(fields.issuing_country, "UTO");
        assert_eq!(fields.surname, "MUSTERMANN");
        assert_eq!(fields.given_names, "ERIKA");
        assert_eq!(fields.document_number, "C01X00T47");
        assert_eq!(fields.nationality, "UTO");
        assert_eq!(fields.birth_date, "740812");
        assert_eq!(fields.sex, Sex::Female);
        assert_eq!(fields.expiry_date, "120415");
        assert_eq!(fields.personal_number, None);
    }

    #[test]
    fn td3_flipping_any_check_digit_invalidates() {
        let lines = sample_td3();
        for index in [9usize, 19, 27, 42, 43] {
            let mut l2: Vec<char> = lines[1].chars().collect();
            let old = l2[index];
            l2[index] = match old.to_digit(10) {
                Some(d) => char::from_digit((d + 1) % 10, 10).unwrap(),
                None => '1',
            };
            let corrupted = vec![lines[0].clone(), l2.into_iter().collect()];
            let fields = MrzParser::parse(&corrupted);
            assert!(!fields.valid, "flip at {} still valid", index);
        }
    }

    #[test]
    fn td3_corrupt_data_still_decodes_fields() {
        let lines = sample_td3();
        let mut l2 = lines[1].clone();
        // Corrupt one birth-date digit; the data stays readable but the
        // verdict must flip.
        l2.replace_range(13..14, "8");
        let fields = MrzParser::parse(&[lines[0].clone(), l2]);
        assert!(!fields.valid);
        assert!(!fields.checks.birth_date);
        assert_eq!(fields.surname, "MUSTERMANN");
        assert_eq!(fields.document_number, "C01X00T47");
    }

    #[test]
    fn td2_round_trip() {
        let fields = MrzParser::parse(&sample_td2());
        assert!(fields.valid, "checks: {:?}", fields.checks);
        assert_eq!(fields.document_format, Some(DocumentFormat::TD2));
        assert_eq!(fields.document_type, "I");
        assert_eq!(fields.document_number, "D23145890");
        assert_eq!(fields.surname, "MUSTERMANN");
        assert_eq!(fields.given_names, "ERIKA");
        assert_eq!(fields.sex, Sex::Female);
    }

    #[test]
    fn td1_round_trip() {
        let fields = MrzParser::parse(&sample_td1());
        assert!(fields.valid, "checks: {:?}", fields.checks);
        assert_eq!(fields.document_format, Some(DocumentFormat::TD1));
        assert_eq!(fields.document_number, "D23145890");
        assert_eq!(fields.nationality, "UTO");
        assert_eq!(fields.birth_date, "740812");
        assert_eq!(fields.expiry_date, "120415");
        assert_eq!(fields.surname, "MUSTERMANN");
        assert_eq!(fields.given_names, "ERIKA");
        assert_eq!(fields.personal_number, None);
    }

    #[test]
    fn multi_word_surname_splits_on_double_filler() {
        let mut lines = sample_td3();
        lines[0] = {
            let mut s = "P<MEXCHAIREZ<DE<LA<CRUZ<<DULCE<IVONNE".to_string();
            while s.len() < 44 {
                s.push('<');
            }
            s
        };
        let fields = MrzParser::parse(&lines);
        assert_eq!(fields.surname, "CHAIREZ DE LA CRUZ");
        assert_eq!(fields.given_names, "DULCE IVONNE");
    }

    #[test]
    fn unknown_shape_is_invalid_not_a_panic() {
        let fields = MrzParser::parse(&["TOO<SHORT".to_string()]);
        assert!(!fields.valid);
        assert_eq!(fields.document_format, None);
        assert!(fields.surname.is_empty());

        let fields = MrzParser::parse_text("");
        assert!(!fields.valid);
    }

    #[test]
    fn illegal_characters_fail_closed() {
        let mut lines = sample_td3();
        lines[1] = lines[1].to_lowercase();
        let fields = MrzParser::parse(&lines);
        assert!(!fields.valid);
    }

    #[test]
    fn td3_personal_number_round_trips() {
        let number = "C01X00T47";
        let personal = "CACD831126<<<<";
        let mut l2 = format!(
            "{}{}MEX{}{}F{}{}{}{}",
            number,
            cd(number),
            "831126",
            cd("831126"),
            "260929",
            cd("260929"),
            personal,
            cd(personal)
        );
        let composite = format!("{}{}{}", &l2[0..10], &l2[13..20], &l2[21..43]);
        l2.push(cd(&composite));
        let lines = vec![pad("P<MEXCHAIREZ<<DULCE", 44), l2];
        let fields = MrzParser::parse(&lines);
        assert!(fields.valid, "checks: {:?}", fields.checks);
        assert_eq!(fields.personal_number.as_deref(), Some("CACD831126"));
    }
}
