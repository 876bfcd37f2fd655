//! Distinguished-name parsing and normalization.
//!
//! A DN is kept in both its raw form (as supplied by the caller) and a
//! normalized form used for every comparison: attribute names lowercased,
//! values canonicalized per their matching rule, components joined with
//! bare commas. Escape sequences (`\,`, `\+`, `\=`) are preserved verbatim
//! so escaped separators never split a component.

use crate::error::{ModifyError, ModifyResult};
use crate::schema::SchemaRegistry;

/// A distinguished name in raw and normalized forms.
///
/// Equality and ordering always use the normalized form.
#[derive(Debug, Clone)]
pub struct Dn {
    raw: String,
    normalized: String,
}

impl Dn {
    /// Parse and normalize a DN against the schema.
    pub fn parse(registry: &SchemaRegistry, raw: &str) -> ModifyResult<Self> {
        let normalized = normalize_dn(registry, raw)?;
        Ok(Self {
            raw: raw.trim().to_string(),
            normalized,
        })
    }

    /// The DN exactly as supplied.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The canonical comparison form.
    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    /// Whether this is the empty (root) DN.
    pub fn is_root(&self) -> bool {
        self.normalized.is_empty()
    }

    /// The superior DN, or `None` for the root and for single-component DNs'
    /// parent being the root.
    pub fn parent(&self) -> Option<Dn> {
        if self.is_root() {
            return None;
        }
        let raw_components = split_unescaped(&self.raw, ',');
        let norm_components = split_unescaped(&self.normalized, ',');
        if norm_components.len() <= 1 {
            return Some(Dn {
                raw: String::new(),
                normalized: String::new(),
            });
        }
        Some(Dn {
            raw: raw_components[1..]
                .iter()
                .map(|c| c.trim())
                .collect::<Vec<_>>()
                .join(","),
            normalized: norm_components[1..].join(","),
        })
    }

    /// Decompose the leading RDN into its attribute name and value,
    /// both in normalized form.
    pub fn first_rdn(&self) -> ModifyResult<Rdn> {
        if self.is_root() {
            return Err(ModifyError::InvalidDnSyntax {
                dn: self.raw.clone(),
                detail: "the root DN has no RDN".to_string(),
            });
        }
        let leading = split_unescaped(&self.normalized, ',')
            .into_iter()
            .next()
            .unwrap_or_default();
        let (attribute, value) =
            leading
                .split_once('=')
                .ok_or_else(|| ModifyError::InvalidDnSyntax {
                    dn: self.raw.clone(),
                    detail: format!("component '{leading}' has no '='"),
                })?;
        Ok(Rdn {
            attribute: attribute.to_string(),
            value: value.to_string(),
        })
    }
}

impl PartialEq for Dn {
    fn eq(&self, other: &Self) -> bool {
        self.normalized == other.normalized
    }
}

impl Eq for Dn {}

impl std::fmt::Display for Dn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

/// A single relative distinguished name in normalized form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rdn {
    /// Normalized (lowercased) attribute name
    pub attribute: String,
    /// Normalized attribute value
    pub value: String,
}

/// Normalize a DN string: lowercase attribute names, canonicalize values
/// per their matching rule, join components with bare commas.
///
/// Attribute types absent from the schema get case-ignore folding, so a
/// DN mentioning site-specific types still normalizes deterministically.
pub fn normalize_dn(registry: &SchemaRegistry, raw: &str) -> ModifyResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(String::new());
    }
    let mut normalized = Vec::new();
    for component in split_unescaped(trimmed, ',') {
        let component = component.trim();
        if contains_unescaped(component, '+') {
            return Err(ModifyError::InvalidDnSyntax {
                dn: raw.to_string(),
                detail: "multi-valued RDNs are not supported".to_string(),
            });
        }
        let (name, value) = split_once_unescaped(component, '=').ok_or_else(|| {
            ModifyError::InvalidDnSyntax {
                dn: raw.to_string(),
                detail: format!("component '{component}' has no '='"),
            }
        })?;
        let name = name.trim().to_ascii_lowercase();
        let value = value.trim();
        if name.is_empty() || value.is_empty() {
            return Err(ModifyError::InvalidDnSyntax {
                dn: raw.to_string(),
                detail: format!("component '{component}' is incomplete"),
            });
        }
        let folded = match registry.resolve(&name) {
            Some(descriptor) if !descriptor.is_dn_syntax() => {
                registry.normalize(&descriptor, value.as_bytes())?
            }
            // Unknown types and nested DN syntaxes fold case-insensitively;
            // recursing on a DN-valued RDN would re-split on its commas.
            _ => value.to_lowercase().into_bytes(),
        };
        let folded = String::from_utf8(folded).map_err(|_| ModifyError::InvalidDnSyntax {
            dn: raw.to_string(),
            detail: format!("component '{component}' is not valid UTF-8"),
        })?;
        normalized.push(format!("{name}={folded}"));
    }
    Ok(normalized.join(","))
}

/// Split on a separator, honoring backslash escapes.
pub fn split_unescaped(s: &str, separator: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut escaped = false;
    for c in s.chars() {
        if escaped {
            current.push(c);
            escaped = false;
        } else if c == '\\' {
            current.push(c);
            escaped = true;
        } else if c == separator {
            parts.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    parts.push(current);
    parts
}

/// Whether the string contains the separator outside any escape sequence.
pub fn contains_unescaped(s: &str, separator: char) -> bool {
    let mut escaped = false;
    for c in s.chars() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == separator {
            return true;
        }
    }
    false
}

fn split_once_unescaped(s: &str, separator: char) -> Option<(&str, &str)> {
    let mut escaped = false;
    for (idx, c) in s.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == separator {
            return Some((&s[..idx], &s[idx + c.len_utf8()..]));
        }
    }
    None
}
