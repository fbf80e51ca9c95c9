//! Selector-level helpers shared by the compiler adapter and the composer.

use regex::Regex;
use std::sync::OnceLock;

/// Escape a class token so it can be used after `.` in a selector.
///
/// `md:p-4` becomes `md\:p-4`, `2xl:flex` becomes `\32 xl\:flex`.
pub fn escape_class(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 8);
    for (i, c) in name.chars().enumerate() {
        if i == 0 && c.is_ascii_digit() {
            out.push_str(&format!("\\{:x} ", c as u32));
        } else if c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii() {
            out.push(c);
        } else {
            out.push('\\');
            out.push(c);
        }
    }
    out
}

/// Collect the unescaped class names referenced by a selector.
pub fn class_names(selector: &str) -> Vec<String> {
    let chars: Vec<char> = selector.chars().collect();
    let mut names = Vec::new();
    let mut i = 0;
    let mut quote: Option<char> = None;

    while i < chars.len() {
        let c = chars[i];
        if let Some(q) = quote {
            if c == '\\' {
                i += 2;
                continue;
            }
            if c == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        match c {
            '"' | '\'' => {
                quote = Some(c);
                i += 1;
            }
            '.' => {
                i += 1;
                let (name, next) = read_ident(&chars, i);
                if !name.is_empty() {
                    names.push(name);
                }
                i = next;
            }
            _ => i += 1,
        }
    }
    names
}

fn read_ident(chars: &[char], mut i: usize) -> (String, usize) {
    let mut name = String::new();
    while i < chars.len() {
        let c = chars[i];
        if c == '\\' {
            i += 1;
            if i >= chars.len() {
                break;
            }
            let hex: String = chars[i..]
                .iter()
                .take(6)
                .take_while(|c| c.is_ascii_hexdigit())
                .collect();
            if hex.is_empty() {
                name.push(chars[i]);
                i += 1;
            } else {
                i += hex.len();
                if let Some(decoded) = u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    name.push(decoded);
                }
                if i < chars.len() && chars[i] == ' ' {
                    i += 1;
                }
            }
        } else if c.is_alphanumeric() || c == '-' || c == '_' || !c.is_ascii() {
            name.push(c);
            i += 1;
        } else {
            break;
        }
    }
    (name, i)
}

/// Split a selector list on top-level commas.
pub fn split_list(selector: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    let mut escaped = false;

    for (i, c) in selector.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        if c == '\\' {
            escaped = true;
            continue;
        }
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(selector[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(selector[start..].trim());
    parts.retain(|p| !p.is_empty());
    parts
}

/// Replace every `.token` class selector with `replacement` (a complete simple
/// selector such as `.windi-abc` or `[bg~="red-500"]`).
pub fn replace_class(selector: &str, token: &str, replacement: &str) -> String {
    let chars: Vec<char> = selector.chars().collect();
    let mut out = String::with_capacity(selector.len());
    let mut i = 0;

    while i < chars.len() {
        if chars[i] == '.' {
            let (name, next) = read_ident(&chars, i + 1);
            if name == token {
                out.push_str(replacement);
            } else {
                out.extend(&chars[i..next]);
            }
            i = next.max(i + 1);
        } else {
            if chars[i] == '\\' && i + 1 < chars.len() {
                out.push(chars[i]);
                i += 1;
            }
            out.push(chars[i]);
            i += 1;
        }
    }
    out
}

fn element_regex() -> &'static Regex {
    static ELEMENT: OnceLock<Regex> = OnceLock::new();
    ELEMENT.get_or_init(|| {
        Regex::new(r"(?:^|[\s>+~,(])([a-zA-Z][a-zA-Z0-9-]*)").expect("static element pattern")
    })
}

/// Element (type) names a selector matches on, e.g. `ul > li a:hover` → `ul, li, a`.
pub fn element_names(selector: &str) -> Vec<String> {
    element_regex()
        .captures_iter(selector)
        .filter_map(|cap| cap.get(1))
        .filter(|m| {
            // `:not(...)` and friends put the pseudo name right before '('
            let before = &selector[..m.start()];
            !before.ends_with(':') && !before.ends_with("::")
        })
        .map(|m| m.as_str().to_ascii_lowercase())
        .collect()
}

/// Selectors that apply to the whole document rather than a particular tag.
pub fn is_global_base(selector: &str) -> bool {
    split_list(selector).iter().any(|part| {
        let part = part.trim();
        part == "*"
            || part.starts_with("*,")
            || part.starts_with("::")
            || part.starts_with(":root")
            || part.starts_with(":host")
            || part == "html"
            || part.starts_with("html ")
            || part.starts_with("html:")
            || part == "body"
            || part.starts_with("body ")
            || part.starts_with("body:")
            || part.starts_with("*::")
            || part.starts_with("*:")
            || part.starts_with('[')
    })
}

/// Base rules that belong to the document rather than to the owner of a tag
pub fn is_document_wide(selector: &str) -> bool {
    is_global_base(selector) || element_names(selector).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_class() {
        assert_eq!(escape_class("p-4"), "p-4");
        assert_eq!(escape_class("md:p-4"), "md\\:p-4");
        assert_eq!(escape_class("w-1/2"), "w-1\\/2");
        assert_eq!(escape_class("2xl:flex"), "\\32 xl\\:flex");
        assert_eq!(escape_class("text-[#fff]"), "text-\\[\\#fff\\]");
    }

    #[test]
    fn test_class_names_unescape() {
        assert_eq!(class_names(".md\\:p-4:hover"), vec!["md:p-4"]);
        assert_eq!(class_names(".\\32 xl\\:flex"), vec!["2xl:flex"]);
        assert_eq!(class_names(".group:hover .group-hover\\:text-white"), vec!["group", "group-hover:text-white"]);
        assert_eq!(class_names("a[href='x.y']"), Vec::<String>::new());
    }

    #[test]
    fn test_escape_round_trips_through_class_names() {
        for token in ["hover:bg-red-500", "w-1/2", "2xl:p-4", "text-[#1a73e8]", "-mt-2"] {
            let selector = format!(".{}", escape_class(token));
            assert_eq!(class_names(&selector), vec![token.to_string()]);
        }
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list("a, b > c"), vec!["a", "b > c"]);
        assert_eq!(split_list(":is(a, b), c"), vec![":is(a, b)", "c"]);
        assert_eq!(split_list("[title='a,b']"), vec!["[title='a,b']"]);
    }

    #[test]
    fn test_replace_class() {
        assert_eq!(
            replace_class(".hover\\:p-4:hover", "hover:p-4", ".windi-x"),
            ".windi-x:hover"
        );
        assert_eq!(
            replace_class(".p-4 .p-40", "p-4", "[p~=\"4\"]"),
            "[p~=\"4\"] .p-40"
        );
    }

    #[test]
    fn test_element_names() {
        assert_eq!(element_names("ul > li a:hover"), vec!["ul", "li", "a"]);
        assert_eq!(element_names("button:not(.x), [type='button']"), vec!["button"]);
        assert!(element_names(".p-4").is_empty());
    }

    #[test]
    fn test_is_global_base() {
        assert!(is_global_base("*, ::before, ::after"));
        assert!(is_global_base("html"));
        assert!(is_global_base("body"));
        assert!(!is_global_base("button"));
        assert!(!is_global_base("h1, h2"));
        assert!(is_document_wide(".dark"));
        assert!(!is_document_wide("h1, h2"));
    }
}
