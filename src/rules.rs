//! Association rules mined upstream, with item sets modelled as sets of labels
//!
//! Item sets use a Python-literal compatible text form: `{'Jeans', 'T-Shirt'}`.
//! Items are single-quoted and separated by `", "`; inside quotes `\'` and
//! `\\` escape a quote and a backslash. Parsing also accepts the
//! `frozenset({...})` wrapper written by the rule miner, double-quoted
//! items, and bare comma-separated lists such as `Jeans, T-Shirt`.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::Serialize;

use crate::data::{float_values, read_csv, string_values};
use crate::error::{SegmentError, SegmentResult};

/// A set of item labels, kept sorted
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ItemSet(BTreeSet<String>);

impl ItemSet {
    pub fn new<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(items.into_iter().map(Into::into).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, item: &str) -> bool {
        self.0.contains(item)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl fmt::Display for ItemSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, item) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str("'")?;
            for ch in item.chars() {
                if ch == '\'' || ch == '\\' {
                    f.write_str("\\")?;
                }
                write!(f, "{}", ch)?;
            }
            f.write_str("'")?;
        }
        f.write_str("}")
    }
}

impl FromStr for ItemSet {
    type Err = SegmentError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| SegmentError::InvalidItemSet {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let mut body = input.trim();
        if let Some(rest) = body.strip_prefix("frozenset(") {
            body = rest
                .strip_suffix(')')
                .ok_or_else(|| invalid("unclosed frozenset("))?
                .trim();
        }
        if let Some(rest) = body.strip_prefix('{') {
            body = rest
                .strip_suffix('}')
                .ok_or_else(|| invalid("missing closing brace"))?;
        }

        parse_items(body).map(Self).map_err(|reason| invalid(&reason))
    }
}

fn parse_items(body: &str) -> Result<BTreeSet<String>, String> {
    let mut items = BTreeSet::new();
    let mut chars = body.chars().peekable();

    loop {
        while chars.next_if(|ch| ch.is_whitespace()).is_some() {}
        let Some(&first) = chars.peek() else {
            break;
        };

        let item = if first == '\'' || first == '"' {
            chars.next();
            let mut item = String::new();
            loop {
                match chars.next() {
                    Some('\\') => match chars.next() {
                        Some(escaped) => item.push(escaped),
                        None => return Err("dangling escape".to_string()),
                    },
                    Some(ch) if ch == first => break,
                    Some(ch) => item.push(ch),
                    None => return Err("unterminated quote".to_string()),
                }
            }
            while chars.next_if(|ch| ch.is_whitespace()).is_some() {}
            item
        } else {
            let mut item = String::new();
            while let Some(ch) = chars.next_if(|&ch| ch != ',') {
                item.push(ch);
            }
            let item = item.trim().to_string();
            if item.is_empty() {
                return Err("empty item".to_string());
            }
            item
        };

        items.insert(item);

        match chars.next() {
            None => break,
            Some(',') => {
                while chars.next_if(|ch| ch.is_whitespace()).is_some() {}
                if chars.peek().is_none() {
                    return Err("trailing separator".to_string());
                }
            }
            Some(ch) => return Err(format!("unexpected character '{}'", ch)),
        }
    }

    Ok(items)
}

/// One rule `antecedents -> consequents` with its interest measures
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssociationRule {
    pub antecedents: ItemSet,
    pub consequents: ItemSet,
    pub support: f64,
    pub confidence: f64,
    pub lift: f64,
}

impl fmt::Display for AssociationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} (support {:.3}, confidence {:.3}, lift {:.3})",
            self.antecedents, self.consequents, self.support, self.confidence, self.lift
        )
    }
}

/// Load rules in file order
///
/// # Errors
/// * `SegmentError::MissingFile` when the rules have not been generated
pub fn load_rules(file_path: impl AsRef<Path>) -> SegmentResult<Vec<AssociationRule>> {
    let frame = read_csv(file_path.as_ref())?;

    let antecedents = string_values(&frame, "antecedents")?;
    let consequents = string_values(&frame, "consequents")?;
    let support = float_values(&frame, "support")?;
    let confidence = float_values(&frame, "confidence")?;
    let lift = float_values(&frame, "lift")?;

    let mut rules = Vec::with_capacity(frame.height());
    for row in 0..frame.height() {
        rules.push(AssociationRule {
            antecedents: antecedents[row].parse()?,
            consequents: consequents[row].parse()?,
            support: support[row],
            confidence: confidence[row],
            lift: lift[row],
        });
    }

    tracing::debug!(
        path = %file_path.as_ref().display(),
        rules = rules.len(),
        "loaded association rules"
    );

    Ok(rules)
}

/// The first `limit` rules of an upstream-sorted rules file
pub fn load_top_rules(file_path: impl AsRef<Path>, limit: usize) -> SegmentResult<Vec<AssociationRule>> {
    let mut rules = load_rules(file_path)?;
    rules.truncate(limit);
    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_frozenset_literal() {
        let items: ItemSet = "frozenset({'Jeans', 'T-Shirt'})".parse().unwrap();
        assert_eq!(items, ItemSet::new(["Jeans", "T-Shirt"]));
    }

    #[test]
    fn test_parse_canonical_and_bare_forms() {
        let canonical: ItemSet = "{'Scarf'}".parse().unwrap();
        assert_eq!(canonical, ItemSet::new(["Scarf"]));

        let bare: ItemSet = " Hoodie ,Cap".parse().unwrap();
        assert_eq!(bare, ItemSet::new(["Cap", "Hoodie"]));

        let double: ItemSet = "{\"Rain Coat\", 'Boots'}".parse().unwrap();
        assert!(double.contains("Rain Coat"));
        assert!(double.contains("Boots"));
    }

    #[test]
    fn test_parse_empty_sets() {
        assert!("frozenset()".parse::<ItemSet>().unwrap().is_empty());
        assert!("{}".parse::<ItemSet>().unwrap().is_empty());
    }

    #[test]
    fn test_display_is_sorted_and_escaped() {
        let items = ItemSet::new(["Socks", "Men's Belt", "A\\B"]);
        assert_eq!(items.to_string(), r"{'A\\B', 'Men\'s Belt', 'Socks'}");

        let reparsed: ItemSet = items.to_string().parse().unwrap();
        assert_eq!(reparsed, items);
    }

    #[test]
    fn test_item_with_comma_survives_canonical_form() {
        let items = ItemSet::new(["Shirt, Linen", "Tie"]);
        let reparsed: ItemSet = items.to_string().parse().unwrap();
        assert_eq!(reparsed.len(), 2);
        assert!(reparsed.contains("Shirt, Linen"));
    }

    #[test]
    fn test_parse_errors() {
        for input in ["{'Jeans'", "frozenset({'Jeans'}", "{'Jeans}", "{'Jeans' 'Cap'}", "Jeans,", "Jeans,,Cap"] {
            let err = input.parse::<ItemSet>().unwrap_err();
            assert!(matches!(err, SegmentError::InvalidItemSet { .. }), "{}", input);
        }
    }

    #[test]
    fn test_load_top_rules() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "antecedents,consequents,support,confidence,lift").unwrap();
        writeln!(file, "\"frozenset({{'Jeans'}})\",\"frozenset({{'T-Shirt'}})\",0.12,0.6,2.4").unwrap();
        writeln!(file, "\"frozenset({{'Scarf', 'Gloves'}})\",\"frozenset({{'Beanie'}})\",0.05,0.5,3.1").unwrap();
        writeln!(file, "\"frozenset({{'Dress'}})\",\"frozenset({{'Heels'}})\",0.04,0.4,1.9").unwrap();

        let rules = load_top_rules(file.path(), 2).unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].antecedents, ItemSet::new(["Jeans"]));
        assert_eq!(rules[1].antecedents, ItemSet::new(["Gloves", "Scarf"]));
        assert_eq!(rules[1].consequents, ItemSet::new(["Beanie"]));
        assert!((rules[1].lift - 3.1).abs() < 1e-12);
    }

    #[test]
    fn test_missing_rules_file() {
        let err = load_rules("no_such_rules.csv").unwrap_err();
        assert!(err.is_missing_file());
    }
}
