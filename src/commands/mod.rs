pub mod prompts;
pub mod run;
pub mod status;
pub mod validate;
