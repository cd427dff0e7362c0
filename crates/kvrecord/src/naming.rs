//! Name derivations for model types.
//!
//! Type names may be namespaced with `::` (`"Shop::LineItem"`). From one
//! name we derive:
//!
//! | helper        | `"Shop::LineItem"`   |
//! |---------------|----------------------|
//! | `underscore`  | `shop/line_item`     |
//! | `collection`  | `shop/line_items`    |
//! | `tableize`    | `shop:line_items`    |
//! | `dasherize`   | `shop--line-item`    |

/// Snake-case a type name, turning `::` into `/`.
pub fn underscore(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let chars: Vec<char> = name.replace("::", "/").chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                Some(p) if p.is_ascii_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_ascii_uppercase() => next.is_some_and(|n| n.is_ascii_lowercase()),
                _ => false,
            };
            if boundary {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else if c == '-' || c == ' ' {
            out.push('_');
        } else {
            out.push(c);
        }
    }
    out
}

/// English plural of a single lowercase word.
pub fn pluralize(word: &str) -> String {
    if word.is_empty() {
        return String::new();
    }
    let ends_in_consonant_y = word.ends_with('y')
        && !word[..word.len() - 1].ends_with(['a', 'e', 'i', 'o', 'u']);
    if ends_in_consonant_y {
        format!("{}ies", &word[..word.len() - 1])
    } else if word.ends_with(['s', 'x', 'z']) || word.ends_with("ch") || word.ends_with("sh") {
        format!("{}es", word)
    } else {
        format!("{}s", word)
    }
}

/// Plural snake-case name, e.g. for cache keys: `"Widget"` → `"widgets"`.
pub fn collection(name: &str) -> String {
    let underscored = underscore(name);
    match underscored.rsplit_once('/') {
        Some((namespace, last)) => format!("{}/{}", namespace, pluralize(last)),
        None => pluralize(&underscored),
    }
}

/// Collection name as used in store keys, with `:` as the namespace separator.
pub fn tableize(name: &str) -> String {
    collection(name).replace('/', ":")
}

/// Lowercase, dash-separated form for element ids.
pub fn dasherize(name: &str) -> String {
    underscore(name).replace('/', "--").replace('_', "-")
}
