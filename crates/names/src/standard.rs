//! Namespaces that every pool registers at construction, at fixed codes.
use crate::code::{PrefixCode, UriCode};

pub const NULL: &str = "";
pub const XML: &str = "http://www.w3.org/XML/1998/namespace";
pub const XSLT: &str = "http://www.w3.org/1999/XSL/Transform";
pub const EXTENSIONS: &str = "urn:stylus:extensions";
pub const FUNCTIONS: &str = "http://exslt.org/functions";

/// `(uri code, conventional prefix, uri)` for each pre-registered namespace, in code order.
pub(crate) const STANDARD_NAMESPACES: [(UriCode, &str, &str); 5] = [
    (UriCode::NULL, "", NULL),
    (UriCode::XML, "xml", XML),
    (UriCode::XSLT, "xsl", XSLT),
    (UriCode::EXTENSIONS, "stylus", EXTENSIONS),
    (UriCode::FUNCTIONS, "func", FUNCTIONS),
];

/// The prefix code of the conventional prefix of a standard namespace. Standard
/// prefixes are registered in the same order as their URIs.
pub fn standard_prefix_code(uri: UriCode) -> Option<PrefixCode> {
    STANDARD_NAMESPACES
        .iter()
        .find(|(code, _, _)| *code == uri)
        .map(|(code, _, _)| PrefixCode(code.0))
}
