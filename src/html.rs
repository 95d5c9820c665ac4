use scraper::{ElementRef, Selector};

use crate::error::ParseError;

pub fn selector(css: &str) -> Result<Selector, ParseError> {
    Selector::parse(css).map_err(|_| ParseError::shape("selector", css))
}

/// Text nodes that are direct children of `element`, joined and trimmed.
pub fn own_text(element: &ElementRef<'_>) -> String {
    element
        .children()
        .filter_map(|child| child.value().as_text().map(|t| String::from(&**t)))
        .collect::<String>()
        .trim()
        .to_string()
}

/// All descendant text, whitespace collapsed.
pub fn full_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn parent_element<'a>(element: &ElementRef<'a>) -> Option<ElementRef<'a>> {
    element.parent().and_then(ElementRef::wrap)
}
