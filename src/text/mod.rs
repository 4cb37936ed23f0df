//! Caption text processing: entity recognition, location-block parsing and
//! query normalization.

pub mod entities;
pub mod normalize;
pub mod parser;

pub use entities::{Entity, EntityCategory, EntityExtractor, EntityRecognizer, HeuristicRecognizer, RecognizerError};
pub use normalize::TextNormalizer;
pub use parser::{BlockOrigin, DescriptionParser, ParsedCaption};
