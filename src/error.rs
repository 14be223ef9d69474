//! Zentrale Fehlertypen für das XSD-Objektmodell.
//!
//! Parse-Fehler sind total: ein fehlgeschlagener Parse liefert nie einen
//! partiellen Baum, sondern genau einen beschreibenden Fehler.

use core::fmt;

/// Alle Fehlerarten des Schema-Modells.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// XML parsing failed (malformed document, encoding, namespaces).
    XmlParseError(String),
    /// XSD structure is invalid (wrong root element, bad attribute value).
    XsdParseError(String),
    /// Eine Schema-Datei konnte nicht gelesen oder geschrieben werden.
    IoError(String),
    /// Zirkuläre xs:include/xs:import-Kette erkannt.
    ///
    /// Enthält den Pfad der Datei, die sich noch in Auflösung befindet
    /// und erneut angefordert wurde.
    CircularInclude(String),
    /// Eine schemaLocation zeigt auf eine nicht existierende Datei.
    SchemaNotFound {
        /// Der literale schemaLocation-Wert aus der Direktive.
        location: String,
        /// Verzeichnis, gegen das aufgelöst wurde.
        base: String,
    },
    /// DoS-Schutz: XSD-Dokument überschreitet die Maximalgröße.
    DocumentTooLarge { size: usize, max: usize },
    /// Selector/Field benötigen einen nicht-leeren XPath-Ausdruck.
    MissingXPath,
    /// Serialisierung fehlgeschlagen (Writer-Fehler, fehlende Pflichtdaten).
    SerializeError(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::XmlParseError(msg) => write!(f, "XML parse error: {msg}"),
            Self::XsdParseError(msg) => write!(f, "XSD parse error: {msg}"),
            Self::IoError(msg) => write!(f, "IO error: {msg}"),
            Self::CircularInclude(path) => {
                write!(f, "circular schema include detected at '{path}'")
            }
            Self::SchemaNotFound { location, base } => {
                write!(f, "schema '{location}' not found (resolved against '{base}')")
            }
            Self::DocumentTooLarge { size, max } => {
                write!(f, "XSD document too large: {size} bytes (max {max} bytes)")
            }
            Self::MissingXPath => {
                write!(f, "selector/field requires a non-empty xpath expression")
            }
            Self::SerializeError(msg) => write!(f, "XSD serialization failed: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

/// Crate-weiter Result-Alias.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    /// Fehler müssen als Box<dyn Error> nutzbar sein.
    #[test]
    fn error_is_std_error() {
        let e: Box<dyn std::error::Error> = Box::new(Error::MissingXPath);
        assert!(!e.to_string().is_empty());
    }

    #[test]
    fn xsd_parse_error_display() {
        let e = Error::XsdParseError("root element must be xs:schema".to_string());
        let msg = e.to_string();
        assert!(msg.contains("XSD"), "{msg}");
        assert!(msg.contains("xs:schema"), "{msg}");
    }

    #[test]
    fn circular_include_display() {
        let e = Error::CircularInclude("/tmp/a.xsd".to_string());
        let msg = e.to_string();
        assert!(msg.contains("circular"), "{msg}");
        assert!(msg.contains("/tmp/a.xsd"), "{msg}");
    }

    #[test]
    fn schema_not_found_display() {
        let e = Error::SchemaNotFound {
            location: "types.xsd".to_string(),
            base: "/schemas".to_string(),
        };
        let msg = e.to_string();
        assert!(msg.contains("types.xsd"), "{msg}");
        assert!(msg.contains("/schemas"), "{msg}");
    }

    /// DoS-Schutz: DocumentTooLarge nennt beide Größen.
    #[test]
    fn document_too_large_display() {
        let e = Error::DocumentTooLarge { size: 5_000_000, max: 4_194_304 };
        let msg = e.to_string();
        assert!(msg.contains("5000000"), "{msg}");
        assert!(msg.contains("4194304"), "{msg}");
    }

    #[test]
    fn missing_xpath_display() {
        let msg = Error::MissingXPath.to_string();
        assert!(msg.contains("xpath"), "{msg}");
    }
}
