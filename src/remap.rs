use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use tracing::{info, warn};

use crate::value::Value;

/// Code reserved for channels whose provider could not be determined.
pub const UNKNOWN_CHANNEL_TYPE: i64 = 0;

/// Provider names of the current channel type codes, indexed by code.
pub const CURRENT_CHANNEL_TYPES: [&str; 41] = [
    "Unknown",
    "OpenAI",
    "API2D",
    "Azure",
    "CloseAI",
    "OpenAISB",
    "OpenAIMax",
    "OhMyGPT",
    "Custom",
    "AILS",
    "AIProxy",
    "PaLM",
    "API2GPT",
    "AIGC2D",
    "Anthropic",
    "Baidu",
    "Zhipu",
    "Ali",
    "Xunfei",
    "360",
    "OpenRouter",
    "AIProxyLibrary",
    "FastGPT",
    "Tencent",
    "AzureSpeech",
    "Gemini",
    "Baichuan",
    "MiniMax",
    "Deepseek",
    "Moonshot",
    "Mistral",
    "Groq",
    "Bedrock",
    "Lingyi",
    "Midjourney",
    "CloudflareAI",
    "Cohere",
    "StabilityAI",
    "Coze",
    "Ollama",
    "Hunyuan",
];

/// Legacy channel type codes with their provider name and assumed current code.
///
/// Several legacy providers share a current code (AwsClaude and Cloudflare,
/// Coze and TogetherAI, Ollama and Doubao). The pairs are kept as shipped and
/// can be overridden from the `[channel_types]` config section.
pub const LEGACY_CHANNEL_TYPES: [(i64, &str, i64); 42] = [
    (0, "Unknown", 0),
    (1, "OpenAI", 1),
    (2, "API2D", 2),
    (3, "Azure", 3),
    (4, "CloseAI", 4),
    (5, "OpenAISB", 5),
    (6, "OpenAIMax", 6),
    (7, "OhMyGPT", 7),
    (8, "Custom", 8),
    (9, "Ails", 9),
    (10, "AIProxy", 10),
    (11, "PaLM", 11),
    (12, "API2GPT", 12),
    (13, "AIGC2D", 13),
    (14, "Anthropic", 14),
    (15, "Baidu", 15),
    (16, "Zhipu", 16),
    (17, "Ali", 17),
    (18, "Xunfei", 18),
    (19, "AI360", 19),
    (20, "OpenRouter", 20),
    (21, "AIProxyLibrary", 21),
    (22, "FastGPT", 22),
    (23, "Tencent", 23),
    (24, "Gemini", 25),
    (25, "Moonshot", 29),
    (26, "Baichuan", 26),
    (27, "Minimax", 27),
    (28, "Mistral", 30),
    (29, "Groq", 31),
    (30, "Ollama", 39),
    (31, "LingYiWanWu", 33),
    (32, "StepFun", 34),
    (33, "AwsClaude", 35),
    (34, "Coze", 38),
    (35, "Cohere", 36),
    (36, "DeepSeek", 28),
    (37, "Cloudflare", 35),
    (38, "DeepL", 37),
    (39, "TogetherAI", 38),
    (40, "Doubao", 39),
    (41, "Dummy", 40),
];

static DEFAULT_CHANNEL_TYPES: LazyLock<HashMap<i64, i64>> = LazyLock::new(|| {
    LEGACY_CHANNEL_TYPES
        .iter()
        .map(|&(legacy, _, current)| (legacy, current))
        .collect()
});

pub fn legacy_channel_name(code: i64) -> &'static str {
    LEGACY_CHANNEL_TYPES
        .iter()
        .find(|(legacy, _, _)| *legacy == code)
        .map_or("?", |(_, name, _)| *name)
}

pub fn current_channel_name(code: i64) -> &'static str {
    usize::try_from(code)
        .ok()
        .and_then(|i| CURRENT_CHANNEL_TYPES.get(i))
        .copied()
        .unwrap_or("?")
}

/// Legacy to current channel type lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelTypeMap {
    codes: HashMap<i64, i64>,
}

impl Default for ChannelTypeMap {
    fn default() -> Self {
        Self {
            codes: DEFAULT_CHANNEL_TYPES.clone(),
        }
    }
}

impl ChannelTypeMap {
    /// Shipped table with `overrides` applied on top (legacy code → current code).
    pub fn with_overrides(overrides: &BTreeMap<i64, i64>) -> Self {
        let mut map = Self::default();
        map.codes.extend(overrides.iter().map(|(&k, &v)| (k, v)));
        map
    }

    pub fn lookup(&self, legacy: i64) -> Option<i64> {
        self.codes.get(&legacy).copied()
    }

    /// Current codes reached from more than one legacy code, with those legacy codes.
    pub fn ambiguous_targets(&self) -> BTreeMap<i64, Vec<i64>> {
        let mut by_current: BTreeMap<i64, Vec<i64>> = BTreeMap::new();
        for (&legacy, &current) in &self.codes {
            by_current.entry(current).or_default().push(legacy);
        }
        by_current.retain(|_, legacy| legacy.len() > 1);
        for legacy in by_current.values_mut() {
            legacy.sort_unstable();
        }
        by_current
    }

    /// Maps a raw legacy value to its current code. Undecodable or unmapped
    /// values become [`UNKNOWN_CHANNEL_TYPE`] instead of failing the row.
    pub fn upgrade(&self, table: &str, raw: &Value) -> Value {
        let Some(legacy) = decode_code(raw) else {
            warn!(table, value = ?raw, "Channel type is not a decimal integer, using Unknown");
            return Value::Integer(UNKNOWN_CHANNEL_TYPE);
        };
        let Some(current) = self.lookup(legacy) else {
            warn!(table, legacy, "Channel type has no current equivalent, using Unknown");
            return Value::Integer(UNKNOWN_CHANNEL_TYPE);
        };
        info!(
            table,
            legacy,
            legacy_name = legacy_channel_name(legacy),
            current,
            current_name = current_channel_name(current),
            "Remapped channel type"
        );
        Value::Integer(current)
    }
}

/// Accepts native integers and decimal text, including text stored as bytes.
fn decode_code(raw: &Value) -> Option<i64> {
    match raw {
        Value::Integer(i) => Some(*i),
        Value::Text(s) => s.trim().parse().ok(),
        Value::Bytes(b) => std::str::from_utf8(b).ok()?.trim().parse().ok(),
        Value::Float(_) | Value::Boolean(_) | Value::Null => None,
    }
}

#[derive(Debug, Clone)]
pub enum RemapRule {
    ChannelType(ChannelTypeMap),
}

impl RemapRule {
    fn apply(&self, table: &str, raw: Value) -> Value {
        match self {
            RemapRule::ChannelType(map) => map.upgrade(table, &raw),
        }
    }
}

/// Per-table, per-column value transforms. Columns without a rule pass through.
#[derive(Debug, Clone, Default)]
pub struct Remapper {
    rules: HashMap<(String, String), RemapRule>,
}

impl Remapper {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with the shipped `channels.type` rule.
    pub fn with_channel_types(map: ChannelTypeMap) -> Self {
        let mut remapper = Self::empty();
        remapper.register("channels", "type", RemapRule::ChannelType(map));
        remapper
    }

    /// Registers `rule` for the column, replacing any previous rule.
    pub fn register(&mut self, table: &str, column: &str, rule: RemapRule) {
        self.rules
            .insert((table.to_string(), column.to_string()), rule);
    }

    #[cfg(test)]
    pub fn has_rule(&self, table: &str, column: &str) -> bool {
        self.rule(table, column).is_some()
    }

    pub fn transform(&self, table: &str, column: &str, raw: Value) -> Value {
        match self.rule(table, column) {
            Some(rule) => rule.apply(table, raw),
            None => raw,
        }
    }

    fn rule(&self, table: &str, column: &str) -> Option<&RemapRule> {
        self.rules.get(&(table.to_string(), column.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remapper() -> Remapper {
        Remapper::with_channel_types(ChannelTypeMap::default())
    }

    #[test]
    fn every_legacy_code_maps_to_its_documented_current_code() {
        let map = ChannelTypeMap::default();
        for (legacy, _, current) in LEGACY_CHANNEL_TYPES {
            assert_eq!(
                map.upgrade("channels", &Value::Integer(legacy)),
                Value::Integer(current),
                "legacy code {}",
                legacy
            );
        }
    }

    #[test]
    fn spot_checks_against_provider_names() {
        let map = ChannelTypeMap::default();
        for (legacy, expected) in [
            ("API2D", "API2D"),
            ("Gemini", "Gemini"),
            ("Moonshot", "Moonshot"),
            ("DeepSeek", "Deepseek"),
            ("LingYiWanWu", "Lingyi"),
            ("Ollama", "Ollama"),
        ] {
            let (code, _, _) = LEGACY_CHANNEL_TYPES
                .iter()
                .find(|(_, name, _)| *name == legacy)
                .copied()
                .unwrap();
            let current = map.lookup(code).unwrap();
            assert_eq!(current_channel_name(current), expected);
        }
    }

    #[test]
    fn unmapped_and_undecodable_values_become_unknown() {
        let map = ChannelTypeMap::default();
        let unknown = Value::Integer(UNKNOWN_CHANNEL_TYPE);
        for raw in [
            Value::Integer(42),
            Value::Integer(-1),
            Value::Text("openai".to_string()),
            Value::Text(String::new()),
            Value::Bytes(vec![0xff, 0xfe]),
            Value::Float(2.0),
            Value::Boolean(true),
            Value::Null,
        ] {
            assert_eq!(map.upgrade("channels", &raw), unknown, "raw {:?}", raw);
        }
    }

    #[test]
    fn textual_and_byte_encoded_codes_are_parsed_as_decimal() {
        let map = ChannelTypeMap::default();
        assert_eq!(map.upgrade("channels", &Value::Text("2".into())), Value::Integer(2));
        assert_eq!(map.upgrade("channels", &Value::Text(" 24 ".into())), Value::Integer(25));
        assert_eq!(map.upgrade("channels", &Value::Bytes(b"2".to_vec())), Value::Integer(2));
        assert_eq!(map.upgrade("channels", &Value::Bytes(b"36".to_vec())), Value::Integer(28));
    }

    #[test]
    fn overrides_replace_and_extend_the_table() {
        let overrides = BTreeMap::from([(33, 32), (99, 1)]);
        let map = ChannelTypeMap::with_overrides(&overrides);
        assert_eq!(map.lookup(33), Some(32));
        assert_eq!(map.lookup(99), Some(1));
        assert_eq!(map.lookup(2), Some(2));
    }

    #[test]
    fn reports_consolidated_current_codes() {
        let ambiguous = ChannelTypeMap::default().ambiguous_targets();
        assert_eq!(ambiguous.get(&35), Some(&vec![33, 37]));
        assert_eq!(ambiguous.get(&38), Some(&vec![34, 39]));
        assert_eq!(ambiguous.get(&39), Some(&vec![30, 40]));
        assert_eq!(ambiguous.len(), 3);
    }

    #[test]
    fn only_registered_columns_are_transformed() {
        let remapper = remapper();
        assert!(remapper.has_rule("channels", "type"));
        assert!(!remapper.has_rule("tokens", "type"));
        assert_eq!(
            remapper.transform("tokens", "type", Value::Text("24".into())),
            Value::Text("24".into())
        );
        assert_eq!(
            remapper.transform("channels", "name", Value::Text("24".into())),
            Value::Text("24".into())
        );
        assert_eq!(
            remapper.transform("channels", "type", Value::Text("24".into())),
            Value::Integer(25)
        );
    }
}
