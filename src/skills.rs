//! Heuristic skill extraction from free text and evidence metadata
//!
//! Stateless and total: any user-supplied input produces a (possibly empty)
//! tag list, never an error. Four signals are merged, in priority order:
//! explicitly assigned tags, vocabulary matches in the text, `#hashtag`
//! tokens, `label: value` lines, and file-extension language mapping from
//! evidence files. Output is de-duplicated case-insensitively, capitalized,
//! and capped.

use std::collections::HashSet;

use once_cell::sync::Lazy;

use crate::model::EvidenceFile;

/// Maximum number of skills returned
pub const MAX_SKILLS: usize = 15;

/// Domain vocabulary matched as case-insensitive substrings
static VOCABULARY: &[&str] = &[
    "penetration testing",
    "web security",
    "network security",
    "reverse engineering",
    "incident response",
    "threat hunting",
    "active directory",
    "machine learning",
    "data analysis",
    "cryptography",
    "forensics",
    "malware",
    "phishing",
    "osint",
    "burp suite",
    "metasploit",
    "wireshark",
    "nmap",
    "kubernetes",
    "docker",
    "terraform",
    "ansible",
    "linux",
    "windows",
    "networking",
    "firewall",
    "python",
    "rust",
    "javascript",
    "typescript",
    "golang",
    "java",
    "bash",
    "powershell",
    "sql",
    "nosql",
    "react",
    "django",
    "fastapi",
    "flask",
    "git",
    "aws",
    "azure",
    "gcp",
    "api design",
    "rest",
    "graphql",
];

/// Line labels whose values are taken as skill lists
static VALUE_LABELS: &[&str] = &[
    "skill", "skills", "language", "languages", "tool", "tools", "tech", "stack", "framework",
    "frameworks",
];

/// File extension -> language/tool name
static EXTENSION_LANGUAGES: Lazy<Vec<(&'static str, &'static str)>> = Lazy::new(|| {
    vec![
        ("rs", "Rust"),
        ("py", "Python"),
        ("js", "JavaScript"),
        ("ts", "TypeScript"),
        ("tsx", "TypeScript"),
        ("jsx", "JavaScript"),
        ("go", "Go"),
        ("java", "Java"),
        ("c", "C"),
        ("cpp", "C++"),
        ("cs", "C#"),
        ("rb", "Ruby"),
        ("php", "PHP"),
        ("sh", "Shell"),
        ("ps1", "PowerShell"),
        ("sql", "SQL"),
        ("ipynb", "Jupyter"),
        ("tf", "Terraform"),
        ("yml", "YAML"),
        ("yaml", "YAML"),
        ("dockerfile", "Docker"),
    ]
});

/// Capitalize the first character, preserving the rest
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Extract skills from free text, evidence files and explicit tags.
///
/// Explicit tags always survive (up to the cap); heuristic matches fill the
/// remaining slots.
pub fn extract_skills(text: &str, evidence: &[EvidenceFile], explicit: &[String]) -> Vec<String> {
    fn push(skill: &str, out: &mut Vec<String>, seen: &mut HashSet<String>) {
        let trimmed = skill.trim();
        if trimmed.is_empty() || trimmed.len() > 60 {
            return;
        }
        let key = trimmed.to_lowercase();
        if seen.insert(key) && out.len() < MAX_SKILLS {
            out.push(capitalize(trimmed));
        }
    }

    let mut out: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    // 1. Explicit tags first
    for tag in explicit {
        push(tag, &mut out, &mut seen);
    }

    let lower = text.to_lowercase();

    // 2. Vocabulary substring matches
    for term in VOCABULARY {
        if lower.contains(term) {
            push(term, &mut out, &mut seen);
        }
    }

    // 3. #hashtag tokens
    for token in text.split_whitespace() {
        if let Some(tag) = token.strip_prefix('#') {
            let tag: String = tag
                .chars()
                .take_while(|c| c.is_alphanumeric() || *c == '-' || *c == '+')
                .collect();
            if tag.chars().any(|c| c.is_alphabetic()) {
                push(&tag, &mut out, &mut seen);
            }
        }
    }

    // 4. "label: value, value" lines for known labels
    for line in text.lines() {
        if let Some((label, values)) = line.split_once(':') {
            let label = label.trim().to_lowercase();
            if VALUE_LABELS.contains(&label.as_str()) {
                for value in values.split(',') {
                    push(value, &mut out, &mut seen);
                }
            }
        }
    }

    // 5. Evidence file extensions
    for file in evidence {
        let candidate = file.name.as_deref().unwrap_or(&file.url);
        if let Some(language) = language_for_file(candidate) {
            push(language, &mut out, &mut seen);
        }
    }

    out
}

/// Map a file name or url to a language via its extension
fn language_for_file(name: &str) -> Option<&'static str> {
    // Strip query strings from urls before looking at the extension
    let name = name.split(['?', '#']).next().unwrap_or(name);
    let ext = name.rsplit('.').next()?.to_lowercase();
    EXTENSION_LANGUAGES
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, lang)| *lang)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(url: &str) -> EvidenceFile {
        EvidenceFile {
            url: url.to_string(),
            kind: "code".to_string(),
            size_bytes: None,
            thumbnail_url: None,
            name: None,
        }
    }

    #[test]
    fn test_empty_input_is_empty_output() {
        assert!(extract_skills("", &[], &[]).is_empty());
    }

    #[test]
    fn test_vocabulary_match_case_insensitive() {
        let skills = extract_skills("Wrote a port scanner in PYTHON using Nmap", &[], &[]);
        assert!(skills.contains(&"Python".to_string()));
        assert!(skills.contains(&"Nmap".to_string()));
    }

    #[test]
    fn test_hashtags_extracted() {
        let skills = extract_skills("writeup for the room #osint #recon.", &[], &[]);
        assert!(skills.contains(&"Osint".to_string()));
        assert!(skills.contains(&"Recon".to_string()));
    }

    #[test]
    fn test_label_value_lines() {
        let text = "Summary of project\nSkills: threat modeling, sql injection\nTools: ghidra";
        let skills = extract_skills(text, &[], &[]);
        assert!(skills.contains(&"Threat modeling".to_string()));
        assert!(skills.contains(&"Sql injection".to_string()));
        assert!(skills.contains(&"Ghidra".to_string()));
    }

    #[test]
    fn test_evidence_extension_mapping() {
        let evidence = vec![file("https://cdn.example/scan.py?token=abc"), file("lib.rs")];
        let skills = extract_skills("", &evidence, &[]);
        assert!(skills.contains(&"Python".to_string()));
        assert!(skills.contains(&"Rust".to_string()));
    }

    #[test]
    fn test_explicit_tags_merged_and_deduped() {
        let skills = extract_skills("learned python", &[], &["python".to_string()]);
        assert_eq!(
            skills.iter().filter(|s| s.to_lowercase() == "python").count(),
            1
        );
    }

    #[test]
    fn test_cap_enforced() {
        let mut text = String::new();
        for i in 0..200 {
            text.push_str(&format!("#skill{} ", i));
        }
        let skills = extract_skills(&text, &[], &[]);
        assert!(skills.len() <= MAX_SKILLS);
    }

    #[test]
    fn test_adversarial_input_never_panics() {
        let long = "a".repeat(1_000_000);
        let _ = extract_skills(&long, &[], &[]);
        let _ = extract_skills(":::::", &[], &[]);
        let _ = extract_skills("#", &[], &[]);
        let _ = extract_skills("\u{0000}\u{FFFF} # : ,", &[], &[]);
        let weird = vec![file(""), file("...."), file("?#")];
        let _ = extract_skills("", &weird, &[]);
    }

    #[test]
    fn test_output_capitalized() {
        let skills = extract_skills("docker and kubernetes", &[], &[]);
        assert!(skills.contains(&"Docker".to_string()));
        assert!(skills.contains(&"Kubernetes".to_string()));
    }
}
