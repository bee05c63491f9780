//! Element locators, UI actions and wait conditions.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// How a driver finds an element.
///
/// Resolved only inside the driver implementation; the orchestrator passes
/// locators through without looking inside.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "by", content = "value", rename_all = "snake_case")]
pub enum Locator {
    Id(String),
    Name(String),
    Css(String),
    #[serde(rename = "xpath")]
    XPath(String),
}

impl Locator {
    pub fn id(value: impl Into<String>) -> Self {
        Self::Id(value.into())
    }

    pub fn name(value: impl Into<String>) -> Self {
        Self::Name(value.into())
    }

    pub fn css(value: impl Into<String>) -> Self {
        Self::Css(value.into())
    }

    pub fn xpath(value: impl Into<String>) -> Self {
        Self::XPath(value.into())
    }
}

impl Display for Locator {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Id(v) => write!(f, "id={v}"),
            Locator::Name(v) => write!(f, "name={v}"),
            Locator::Css(v) => write!(f, "css={v}"),
            Locator::XPath(v) => write!(f, "xpath={v}"),
        }
    }
}

/// A resolved UI action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Click,
    Type(String),
    Select(String),
    SetChecked(bool),
}

impl Action {
    /// Short name for logs; typed values are not included.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Click => "click",
            Action::Type(_) => "type",
            Action::Select(_) => "select",
            Action::SetChecked(_) => "set_checked",
        }
    }
}

/// Something the page can be waited on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "when", rename_all = "snake_case")]
pub enum Condition {
    /// The element exists and is visible.
    Visible { locator: Locator },
    /// The element is gone or hidden.
    Hidden { locator: Locator },
    /// The current URL contains the fragment.
    UrlContains { fragment: String },
    /// The page text contains the string.
    TextPresent { text: String },
}

impl Condition {
    pub fn visible(locator: Locator) -> Self {
        Self::Visible { locator }
    }

    pub fn hidden(locator: Locator) -> Self {
        Self::Hidden { locator }
    }

    pub fn url_contains(fragment: impl Into<String>) -> Self {
        Self::UrlContains {
            fragment: fragment.into(),
        }
    }

    pub fn text_present(text: impl Into<String>) -> Self {
        Self::TextPresent { text: text.into() }
    }
}

impl Display for Condition {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Visible { locator } => write!(f, "visible({locator})"),
            Condition::Hidden { locator } => write!(f, "hidden({locator})"),
            Condition::UrlContains { fragment } => write!(f, "url_contains({fragment})"),
            Condition::TextPresent { text } => write!(f, "text_present({text})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_serde_shape() {
        let json = serde_json::to_value(Locator::xpath("//button[1]")).unwrap();
        assert_eq!(json, serde_json::json!({"by": "xpath", "value": "//button[1]"}));

        let parsed: Locator = serde_json::from_str(r#"{"by": "name", "value": "email"}"#).unwrap();
        assert_eq!(parsed, Locator::name("email"));
    }

    #[test]
    fn test_condition_serde_shape() {
        let parsed: Condition = serde_json::from_str(
            r##"{"when": "visible", "locator": {"by": "css", "value": "#code"}}"##,
        )
        .unwrap();
        assert_eq!(parsed, Condition::visible(Locator::css("#code")));
        assert_eq!(parsed.to_string(), "visible(css=#code)");
    }
}
