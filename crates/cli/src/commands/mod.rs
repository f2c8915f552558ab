pub mod reports;
pub mod run;
