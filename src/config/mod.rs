mod defaults;
mod parser;
mod settings;
mod validation;

pub(crate) use parser::CONFIG_KEYS;
pub use settings::AppConfig;
