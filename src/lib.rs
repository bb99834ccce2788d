pub mod book;
pub mod checker;
pub mod cli;
pub mod config;
pub mod error;
pub mod locale;

pub use book::Book;
pub use checker::index::{Location, NodeItem, WordIndex, WordKey};
pub use checker::SpellChecker;
pub use config::Config;
pub use error::BookError;
pub use locale::{parse_lang_code, Locale};
