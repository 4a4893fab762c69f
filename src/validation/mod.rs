pub mod checksum;
pub mod date;
pub mod mrz;

pub use mrz::MrzParser;
