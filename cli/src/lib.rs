pub mod patterns;

pub use patterns::Cli;
pub use patterns::run;
