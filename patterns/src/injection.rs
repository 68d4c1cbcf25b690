//! Prompt-injection heuristics for pattern content.
//!
//! Every rule is tagged with a severity; the overall risk of a piece of
//! content is the highest severity among its findings, `low` when none.

use std::sync::LazyLock;

use base64::Engine as _;
use base64::alphabet;
use base64::engine::DecodePaddingMode;
use base64::engine::GeneralPurpose;
use base64::engine::GeneralPurposeConfig;
use regex::Regex;
use serde::Serialize;

#[derive(Clone, Copy, Debug, Default, Serialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum InjectionRisk {
    #[default]
    Low,
    Medium,
    High,
}

impl InjectionRisk {
    pub fn as_str(self) -> &'static str {
        match self {
            InjectionRisk::Low => "low",
            InjectionRisk::Medium => "medium",
            InjectionRisk::High => "high",
        }
    }
}

impl std::fmt::Display for InjectionRisk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    InstructionOverride,
    PromptExfiltration,
    RoleReassignment,
    RoleMarker,
    HiddenContent,
    Obfuscation,
    DelimiterInjection,
    Jailbreak,
    CommandExecution,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::InstructionOverride => "instruction override",
            Category::PromptExfiltration => "prompt exfiltration",
            Category::RoleReassignment => "role reassignment",
            Category::RoleMarker => "role marker",
            Category::HiddenContent => "hidden content",
            Category::Obfuscation => "obfuscation",
            Category::DelimiterInjection => "delimiter injection",
            Category::Jailbreak => "jailbreak",
            Category::CommandExecution => "command execution",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct Finding {
    pub rule: &'static str,
    pub category: Category,
    pub risk: InjectionRisk,
    /// 1-based line number, 0 when the match spans several lines.
    pub line: usize,
    #[serde(rename = "match")]
    pub matched: String,
    pub message: &'static str,
}

#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct InjectionScan {
    pub risk: InjectionRisk,
    pub findings: Vec<Finding>,
}

impl InjectionScan {
    pub fn is_clean(&self) -> bool {
        self.risk == InjectionRisk::Low && self.findings.is_empty()
    }
}

enum Matcher {
    Pattern(Regex),
    Check(fn(&str) -> Option<String>),
}

struct Rule {
    id: &'static str,
    category: Category,
    risk: InjectionRisk,
    message: &'static str,
    matcher: Matcher,
}

impl Rule {
    fn find(&self, line: &str) -> Option<String> {
        match &self.matcher {
            Matcher::Pattern(re) => re.find(line).map(|m| m.as_str().to_string()),
            Matcher::Check(check) => check(line),
        }
    }
}

enum Source {
    Regex(&'static str),
    Check(fn(&str) -> Option<String>),
}

const HTML_COMMENT: &str = "html-comment";

const RULE_TABLE: &[(&str, Category, InjectionRisk, &str, Source)] = &[
    (
        "ignore-instructions",
        Category::InstructionOverride,
        InjectionRisk::High,
        "Instruction override attempt",
        Source::Regex(
            r"(?i)\b(ignore|disregard|forget|override)\s+(all\s+)?(the\s+)?(previous|prior|above|earlier|existing)\s+(instructions|rules|guidelines|constraints|prompts)",
        ),
    ),
    (
        "new-instructions",
        Category::InstructionOverride,
        InjectionRisk::High,
        "New instruction injection",
        Source::Regex(r"(?i)\b(new|updated|revised|real)\s+(instructions|rules|guidelines|system\s+prompt)\s*[:=]"),
    ),
    (
        "prompt-exfiltration",
        Category::PromptExfiltration,
        InjectionRisk::High,
        "Request to reveal hidden prompt or instructions",
        Source::Regex(
            r"(?i)\b(reveal|show|print|display|repeat|output|leak|dump|tell\s+me)\s+(me\s+)?(your|the)\s+(\w+\s+)?(system|hidden|initial|original|secret)\s+(prompt|instructions|message)",
        ),
    ),
    (
        "role-marker-system",
        Category::RoleMarker,
        InjectionRisk::High,
        "System role marker detected",
        Source::Regex(r"^\s*(system|SYSTEM)\s*:\s*"),
    ),
    (
        "role-marker-assistant",
        Category::RoleMarker,
        InjectionRisk::Medium,
        "Assistant role marker detected",
        Source::Regex(r"^\s*(assistant|ASSISTANT)\s*:\s*"),
    ),
    (
        "role-marker-user",
        Category::RoleMarker,
        InjectionRisk::Medium,
        "User role marker detected",
        Source::Regex(r"^\s*(user|USER|human|HUMAN)\s*:\s*"),
    ),
    (
        "role-hijack",
        Category::RoleReassignment,
        InjectionRisk::High,
        "Role hijacking attempt",
        Source::Regex(
            r"(?i)\b(you\s+are\s+now|act\s+as|pretend\s+(to\s+be|you\s+are)|from\s+now\s+on\s+you\s+are|your\s+new\s+role\s+is)\b",
        ),
    ),
    (
        "base64-block",
        Category::HiddenContent,
        InjectionRisk::Medium,
        "Base64-encoded block detected (may hide instructions)",
        Source::Check(check_base64_block),
    ),
    (
        HTML_COMMENT,
        Category::HiddenContent,
        InjectionRisk::Medium,
        "HTML comment with instructions detected",
        Source::Regex(r"<!--\s*(?i:system|instruction|ignore|override|prompt|role)(?s:.*?)-->"),
    ),
    (
        "markdown-comment",
        Category::HiddenContent,
        InjectionRisk::Medium,
        "Hidden markdown content detected",
        Source::Regex(r"\[//\]:\s*#\s*\(.*(?i:ignore|system|instruction|override).*\)"),
    ),
    (
        "unicode-homoglyph",
        Category::Obfuscation,
        InjectionRisk::Low,
        "Unicode homoglyph obfuscation detected",
        Source::Check(check_homoglyphs),
    ),
    (
        "delimiter-injection",
        Category::DelimiterInjection,
        InjectionRisk::Medium,
        "Context delimiter injection",
        Source::Regex(
            r"(?i)(</?(system|context|instructions|prompt)>|---\s*(system|end\s+of\s+instructions)\s*---)",
        ),
    ),
    (
        "command-execution",
        Category::CommandExecution,
        InjectionRisk::Medium,
        "Embedded command execution marker",
        Source::Regex(
            r"(?i)(\b(curl|wget)\s[^\n|]*\|\s*(sudo\s+)?(ba|z)?sh\b|\brm\s+-rf\s+(/|~)(\s|$)|</?\s*(execute|tool_call|function_calls)\s*>)",
        ),
    ),
    (
        "jailbreak-keywords",
        Category::Jailbreak,
        InjectionRisk::Low,
        "Potential jailbreak keywords detected",
        Source::Regex(r"(?i)(\bDAN\s+mode\b|\bjailbreak|\bbypass\s+(safety|filter|restriction)|\bdo\s+anything\s+now\b)"),
    ),
];

static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    RULE_TABLE
        .iter()
        .filter_map(|(id, category, risk, message, source)| {
            let matcher = match source {
                Source::Regex(src) => match Regex::new(src) {
                    Ok(re) => Matcher::Pattern(re),
                    Err(e) => {
                        tracing::error!("injection rule {id} failed to compile: {e}");
                        return None;
                    }
                },
                Source::Check(f) => Matcher::Check(*f),
            };
            Some(Rule {
                id: *id,
                category: *category,
                risk: *risk,
                message: *message,
                matcher,
            })
        })
        .collect()
});

/// Classifies `content` for prompt-injection risk. Pure; never fails.
pub fn scan(content: &str) -> InjectionScan {
    let rules = &*RULES;
    let mut findings = Vec::new();

    for (idx, line) in content.split('\n').enumerate() {
        for rule in rules {
            if let Some(matched) = rule.find(line) {
                findings.push(finding(rule, idx + 1, &matched));
            }
        }
    }

    // Comments may open and close on different lines. Single-line ones were
    // reported by the line pass.
    if let Some(rule) = rules.iter().find(|r| r.id == HTML_COMMENT)
        && let Matcher::Pattern(re) = &rule.matcher
    {
        for m in re.find_iter(content).filter(|m| m.as_str().contains('\n')) {
            findings.push(finding(rule, 0, m.as_str()));
        }
    }

    let risk = findings
        .iter()
        .map(|f| f.risk)
        .max()
        .unwrap_or(InjectionRisk::Low);
    InjectionScan { risk, findings }
}

fn finding(rule: &Rule, line: usize, matched: &str) -> Finding {
    Finding {
        rule: rule.id,
        category: rule.category,
        risk: rule.risk,
        line,
        matched: truncate_match(matched),
        message: rule.message,
    }
}

fn truncate_match(s: &str) -> String {
    const MAX: usize = 80;
    match s.char_indices().nth(MAX) {
        Some((cut, _)) => format!("{}...", &s[..cut]),
        None => s.to_string(),
    }
}

/// Tolerates missing padding and stray trailing bits.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

static BASE64_RUN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"[A-Za-z0-9+/]{40,}={0,2}").ok());

const HIDDEN_KEYWORDS: &[&str] = &[
    "ignore",
    "system",
    "instruction",
    "override",
    "pretend",
    "act as",
    "you are",
];

fn check_base64_block(line: &str) -> Option<String> {
    let re = BASE64_RUN.as_ref()?;
    re.find_iter(line)
        .map(|m| m.as_str())
        .find(|candidate| {
            let Ok(decoded) = LENIENT_BASE64.decode(candidate) else {
                return false;
            };
            if !is_printable_text(&decoded) {
                return false;
            }
            let text = String::from_utf8_lossy(&decoded).to_lowercase();
            HIDDEN_KEYWORDS.iter().any(|k| text.contains(k))
        })
        .map(str::to_string)
}

fn is_printable_text(data: &[u8]) -> bool {
    if data.is_empty() {
        return false;
    }
    let printable = data
        .iter()
        .filter(|&&b| (32..127).contains(&b) || matches!(b, b'\n' | b'\r' | b'\t'))
        .count();
    printable as f64 / data.len() as f64 > 0.8
}

/// Cyrillic letters that render like Latin ones.
const HOMOGLYPHS: &[char] = &[
    '\u{0410}', '\u{0412}', '\u{0421}', '\u{0415}', '\u{041D}', '\u{041A}', '\u{041C}', '\u{041E}',
    '\u{0420}', '\u{0422}', '\u{0425}', '\u{0430}', '\u{0435}', '\u{043E}', '\u{0440}', '\u{0441}',
    '\u{0443}', '\u{0445}', '\u{0456}', '\u{0458}', '\u{0405}', '\u{0455}',
];

fn is_latin(c: char) -> bool {
    c.is_ascii_alphabetic() || (('\u{00C0}'..='\u{024F}').contains(&c) && c.is_alphabetic())
}

fn check_homoglyphs(line: &str) -> Option<String> {
    let has_latin = line.chars().any(is_latin);
    let has_homoglyph = line.chars().any(|c| HOMOGLYPHS.contains(&c));
    (has_latin && has_homoglyph).then(|| "mixed Latin/Cyrillic characters".to_string())
}

/// One line per finding, for terminal output.
pub fn format_findings(findings: &[Finding]) -> String {
    if findings.is_empty() {
        return "  No injection patterns detected.\n".to_string();
    }
    let mut out = String::new();
    for f in findings {
        out.push_str(&format!(
            "  Line {}: [{}] {} ({})\n",
            f.line, f.risk, f.message, f.matched
        ));
    }
    out
}
