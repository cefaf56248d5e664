//! Key-path parsing and matching.
//!
//! Key-paths are dot-separated strings like `ScoreBoard.Team(1).Skater(42).Name`.
//! A segment is either a bare name (`ScoreBoard`) or a parameterized name
//! (`Team(1)`). Parameters may themselves contain dots, as in
//! `Setting(Overlay.Interactive.Clock)`, so splitting is done by a small
//! tokenizer that only treats `.` as a separator outside parentheses.

use std::fmt;

use crate::error::KeyPathError;

/// One segment of a key-path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    name: String,
    param: Option<String>,
}

impl Segment {
    /// The segment name (`Team` in `Team(1)`).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The segment parameter (`1` in `Team(1)`), if any.
    pub fn param(&self) -> Option<&str> {
        self.param.as_deref()
    }

    fn parse(raw: &str) -> Result<Self, KeyPathError> {
        if raw.is_empty() {
            return Err(KeyPathError::EmptySegment);
        }

        let Some(open) = raw.find('(') else {
            if raw.contains(')') {
                return Err(KeyPathError::Unbalanced(raw.to_string()));
            }
            return Ok(Self {
                name: raw.to_string(),
                param: None,
            });
        };

        if open == 0 {
            return Err(KeyPathError::MissingName(raw.to_string()));
        }
        if !raw.ends_with(')') {
            return Err(KeyPathError::TrailingText(raw.to_string()));
        }

        // The tokenizer guarantees balance across the whole segment, so the
        // final ')' closes the first '(' only if nothing closes it earlier.
        let inner = &raw[open + 1..raw.len() - 1];
        let mut depth = 0usize;
        for c in inner.chars() {
            match c {
                '(' => depth += 1,
                ')' => {
                    if depth == 0 {
                        return Err(KeyPathError::TrailingText(raw.to_string()));
                    }
                    depth -= 1;
                }
                _ => {}
            }
        }

        Ok(Self {
            name: raw[..open].to_string(),
            param: Some(inner.to_string()),
        })
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.param {
            Some(param) => write!(f, "{}({})", self.name, param),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A parsed key-path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPath {
    /// The original key string
    raw: String,
    /// Segments split on top-level '.'
    segments: Vec<Segment>,
}

impl KeyPath {
    /// Tokenize a key-path string into segments.
    pub fn parse(key: &str) -> Result<Self, KeyPathError> {
        if key.is_empty() {
            return Err(KeyPathError::Empty);
        }

        let mut segments = Vec::new();
        let mut depth = 0usize;
        let mut start = 0usize;

        for (i, c) in key.char_indices() {
            match c {
                '(' => depth += 1,
                ')' => {
                    depth = depth
                        .checked_sub(1)
                        .ok_or_else(|| KeyPathError::Unbalanced(key.to_string()))?;
                }
                '.' if depth == 0 => {
                    segments.push(Segment::parse(&key[start..i])?);
                    start = i + 1;
                }
                _ => {}
            }
        }

        if depth != 0 {
            return Err(KeyPathError::Unbalanced(key.to_string()));
        }
        segments.push(Segment::parse(&key[start..])?);

        Ok(Self {
            raw: key.to_string(),
            segments,
        })
    }

    /// Get the raw key string.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Get the key segments.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Check if this key is `prefix` or one of its descendants.
    pub fn starts_with(&self, prefix: &KeyPath) -> bool {
        prefix.segments.len() <= self.segments.len()
            && self
                .segments
                .iter()
                .zip(prefix.segments.iter())
                .all(|(a, b)| a == b)
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl std::str::FromStr for KeyPath {
    type Err = KeyPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        KeyPath::parse(s)
    }
}

/// A subscription pattern: an exact key, a family prefix, or `*`.
///
/// `ScoreBoard.Team(1)` matches `ScoreBoard.Team(1)` itself and every key
/// below it (`ScoreBoard.Team(1).Name`), but not `ScoreBoard.Team(10).Name`.
/// A pattern whose last segment has no parameter also covers every
/// parameter of that segment: `ScoreBoard.Team` matches
/// `ScoreBoard.Team(2).Skater(7).Id` but not `ScoreBoard.Teams`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPattern {
    raw: String,
    any: bool,
    open_param: bool,
}

impl KeyPattern {
    pub fn new(pattern: &str) -> Result<Self, KeyPathError> {
        if pattern == "*" {
            return Ok(Self {
                raw: pattern.to_string(),
                any: true,
                open_param: false,
            });
        }
        let path = KeyPath::parse(pattern)?;
        let open_param = path
            .segments()
            .last()
            .map_or(false, |segment| segment.param().is_none());
        Ok(Self {
            raw: pattern.to_string(),
            any: false,
            open_param,
        })
    }

    /// Check if a concrete key matches this pattern.
    pub fn matches(&self, key: &str) -> bool {
        if self.any {
            return true;
        }
        match key.strip_prefix(self.raw.as_str()) {
            Some(rest) => {
                rest.is_empty()
                    || rest.starts_with('.')
                    || (self.open_param && rest.starts_with('('))
            }
            None => false,
        }
    }

    /// Whether this is the match-everything pattern.
    pub fn is_any(&self) -> bool {
        self.any
    }

    /// Get the raw pattern string.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for KeyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Identity extracted from an entity key by [`KeyParser`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedKey {
    /// Parameter of each entity segment, outermost first.
    pub ids: Vec<String>,
    /// Everything after the last entity segment (may span several segments).
    pub field: String,
}

impl ParsedKey {
    /// Id of the innermost entity (the skater in `Team(1).Skater(42)`).
    pub fn entity_id(&self) -> &str {
        self.ids.last().map(String::as_str).unwrap_or_default()
    }

    /// Id of the entity at `depth` (0 = outermost).
    pub fn id(&self, depth: usize) -> Option<&str> {
        self.ids.get(depth).map(String::as_str)
    }
}

/// Extracts entity ids and field names from keys shaped like
/// `Namespace.Entity(id).Child(id).Field`.
///
/// Keys that don't have that shape (settings, other namespaces, malformed
/// input) yield `None`; callers treat that as "not for me".
#[derive(Debug, Clone)]
pub struct KeyParser {
    namespace: String,
    entities: Vec<String>,
}

impl KeyParser {
    pub fn new(namespace: &str, entities: &[&str]) -> Self {
        Self {
            namespace: namespace.to_string(),
            entities: entities.iter().map(|e| e.to_string()).collect(),
        }
    }

    /// The family prefix covering every key this parser understands.
    pub fn family(&self) -> String {
        match self.entities.first() {
            Some(outer) => format!("{}.{}", self.namespace, outer),
            None => self.namespace.clone(),
        }
    }

    pub fn parse(&self, key: &str) -> Option<ParsedKey> {
        let path = KeyPath::parse(key).ok()?;
        let segments = path.segments();

        // namespace + one segment per entity + at least one field segment
        if segments.len() < self.entities.len() + 2 {
            return None;
        }

        let namespace = &segments[0];
        if namespace.name() != self.namespace || namespace.param().is_some() {
            return None;
        }

        let mut ids = Vec::with_capacity(self.entities.len());
        for (segment, entity) in segments[1..].iter().zip(&self.entities) {
            if segment.name() != entity {
                return None;
            }
            ids.push(segment.param()?.to_string());
        }

        let field = segments[self.entities.len() + 1..]
            .iter()
            .map(Segment::to_string)
            .collect::<Vec<_>>()
            .join(".");

        Some(ParsedKey { ids, field })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_parsing() {
        let key = KeyPath::parse("ScoreBoard.Team(1).Skater(42).Name").unwrap();
        let names: Vec<&str> = key.segments().iter().map(Segment::name).collect();
        assert_eq!(names, ["ScoreBoard", "Team", "Skater", "Name"]);
        assert_eq!(key.segments()[1].param(), Some("1"));
        assert_eq!(key.segments()[3].param(), None);
    }

    #[test]
    fn test_param_with_dots() {
        let key = KeyPath::parse("ScoreBoard.Settings.Setting(Overlay.Interactive.Clock)").unwrap();
        assert_eq!(key.segments().len(), 3);
        assert_eq!(key.segments()[2].name(), "Setting");
        assert_eq!(key.segments()[2].param(), Some("Overlay.Interactive.Clock"));
        assert_eq!(key.to_string(), "ScoreBoard.Settings.Setting(Overlay.Interactive.Clock)");
    }

    #[test]
    fn test_nested_parens_in_param() {
        let key = KeyPath::parse("A.B(x(1).y).C").unwrap();
        assert_eq!(key.segments()[1].param(), Some("x(1).y"));
        assert_eq!(key.segments()[2].name(), "C");
    }

    #[test]
    fn test_malformed_keys() {
        assert_eq!(KeyPath::parse(""), Err(KeyPathError::Empty));
        assert_eq!(KeyPath::parse("A..B"), Err(KeyPathError::EmptySegment));
        assert_eq!(KeyPath::parse("A."), Err(KeyPathError::EmptySegment));
        assert!(matches!(KeyPath::parse("A.Team(1"), Err(KeyPathError::Unbalanced(_))));
        assert!(matches!(KeyPath::parse("A.Team1)"), Err(KeyPathError::Unbalanced(_))));
        assert!(matches!(KeyPath::parse("A.(1)"), Err(KeyPathError::MissingName(_))));
        assert!(matches!(KeyPath::parse("A.Team(1)x"), Err(KeyPathError::TrailingText(_))));
        assert!(matches!(KeyPath::parse("A.T(1)(2)"), Err(KeyPathError::TrailingText(_))));
    }

    #[test]
    fn test_key_starts_with() {
        let key = KeyPath::parse("ScoreBoard.Team(1).Name").unwrap();
        assert!(key.starts_with(&KeyPath::parse("ScoreBoard.Team(1)").unwrap()));
        assert!(!key.starts_with(&KeyPath::parse("ScoreBoard.Team(10)").unwrap()));
    }

    #[test]
    fn test_exact_pattern() {
        let pattern = KeyPattern::new("ScoreBoard.Team(1).Name").unwrap();
        assert!(pattern.matches("ScoreBoard.Team(1).Name"));
        assert!(!pattern.matches("ScoreBoard.Team(1).NameX"));
        assert!(!pattern.matches("ScoreBoard.Team(1)"));
    }

    #[test]
    fn test_family_pattern_segment_boundary() {
        let pattern = KeyPattern::new("Team(1)").unwrap();
        assert!(pattern.matches("Team(1)"));
        assert!(pattern.matches("Team(1).Name"));
        assert!(!pattern.matches("Team(10).Name"));

        let family = KeyPattern::new("ScoreBoard.Team").unwrap();
        assert!(family.matches("ScoreBoard.Team(2).Skater(7).Id"));
        assert!(!family.matches("ScoreBoard.Teams"));
        assert!(!family.matches("ScoreBoard.Settings.Setting(ScoreBoard.Team)"));
    }

    #[test]
    fn test_family_pattern_covers_parameters() {
        let family = KeyPattern::new("ScoreBoard.Team").unwrap();
        assert!(family.matches("ScoreBoard.Team"));
        assert!(family.matches("ScoreBoard.Team(1).X"));
        assert!(family.matches("ScoreBoard.Team.Count"));
        assert!(!family.matches("ScoreBoard.Teams"));
        assert!(!family.matches("ScoreBoard.Teams(1).X"));

        // a parameterized last segment only covers that parameter
        let team = KeyPattern::new("Team(1)").unwrap();
        assert!(!team.matches("Team(10)"));
        assert!(!team.matches("Team(10).Name"));
        assert!(!team.matches("Team(1)(2)"));
    }

    #[test]
    fn test_full_wildcard() {
        let pattern = KeyPattern::new("*").unwrap();
        assert!(pattern.is_any());
        assert!(pattern.matches("ScoreBoard.Clock(Jam).Time"));
        assert!(pattern.matches("x"));
    }

    #[test]
    fn test_pattern_rejects_unbalanced() {
        assert!(KeyPattern::new("ScoreBoard.Settings.Setting(Overlay").is_err());
        assert!(KeyPattern::new("").is_err());
    }

    #[test]
    fn test_skater_parser() {
        let parser = KeyParser::new("ScoreBoard", &["Team", "Skater"]);
        assert_eq!(parser.family(), "ScoreBoard.Team");

        let parsed = parser.parse("ScoreBoard.Team(1).Skater(42).Name").unwrap();
        assert_eq!(parsed.id(0), Some("1"));
        assert_eq!(parsed.entity_id(), "42");
        assert_eq!(parsed.field, "Name");
    }

    #[test]
    fn test_parser_deep_field_and_dotted_ids() {
        let parser = KeyParser::new("ScoreBoard", &["Team", "Skater"]);

        let parsed = parser
            .parse("ScoreBoard.Team(a.b).Skater(x.y).Penalty(1).Code")
            .unwrap();
        assert_eq!(parsed.ids, ["a.b", "x.y"]);
        assert_eq!(parsed.field, "Penalty(1).Code");
    }

    #[test]
    fn test_parser_rejects_other_shapes() {
        let parser = KeyParser::new("ScoreBoard", &["Team", "Skater"]);
        assert!(parser.parse("ScoreBoard.Settings.Setting(Overlay.Interactive.Clock)").is_none());
        assert!(parser.parse("ScoreBoard.Team(1).Name").is_none());
        assert!(parser.parse("ScoreBoard.Team(1).Skater(42)").is_none());
        assert!(parser.parse("ScoreBoard.Team.Skater(42).Name").is_none());
        assert!(parser.parse("Other.Team(1).Skater(42).Name").is_none());
        assert!(parser.parse("ScoreBoard.Team(1.Skater(42).Name").is_none());
    }
}
