//! SQL identifier derivation for model types.

/// Table name for a model type.
///
/// A non-empty `override_name` is used verbatim; otherwise the type name is
/// converted with [`to_snake_case`].
pub fn table_name(type_name: &str, override_name: Option<&str>) -> String {
    match override_name {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => to_snake_case(type_name),
    }
}

/// Convert a CamelCase type name to snake_case.
///
/// Abbreviation runs stay together (`UserNDAContract` becomes
/// `user_nda_contract`), digits attach to the word before them unless a new
/// capitalised word follows (`User2FA` becomes `user_2fa`, `User2Company`
/// becomes `user_2_company`). Existing underscores are kept, leading and
/// trailing ones are stripped.
pub fn to_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    if chars.iter().any(|c| c.is_alphabetic()) && !chars.iter().any(|c| c.is_lowercase()) {
        return name.to_lowercase().trim_matches('_').to_string();
    }

    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if i > 0 && starts_word(&chars, i) {
            out.push('_');
        }
        out.extend(c.to_lowercase());
    }
    out.trim_matches('_').to_string()
}

fn starts_word(chars: &[char], i: usize) -> bool {
    let c = chars[i];
    let prev = chars[i - 1];
    let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());

    if c.is_uppercase() {
        prev.is_lowercase()
            || (prev.is_uppercase() && next_lower)
            || (prev.is_ascii_digit() && next_lower)
    } else if c.is_ascii_digit() {
        prev.is_lowercase()
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snake_case_cases() {
        let cases = [
            ("NDA", "nda"),
            ("UserNDA", "user_nda"),
            ("UserNDAContract", "user_nda_contract"),
            ("UserConfig", "user_config"),
            ("User", "user"),
            ("NDAUser", "nda_user"),
            ("UserNDAXMLContract", "user_ndaxml_contract"),
            ("UserAContract", "user_a_contract"),
            ("userNDA", "user_nda"),
            ("UserNDAXML", "user_ndaxml"),
            ("UserA", "user_a"),
            ("User2FA", "user_2fa"),
            ("XMLUserNDA", "xml_user_nda"),
            ("user", "user"),
            ("User_NDA", "user_nda"),
            ("User__NDA", "user__nda"),
            ("User2Company", "user_2_company"),
        ];
        for (input, expected) in cases {
            assert_eq!(to_snake_case(input), expected, "input: {}", input);
        }
    }

    #[test]
    fn test_snake_case_strips_outer_underscores() {
        assert_eq!(to_snake_case("_Order_"), "order");
        assert_eq!(to_snake_case("__NDA"), "nda");
    }

    #[test]
    fn test_snake_case_is_deterministic() {
        let first = to_snake_case("OrderLineItem");
        assert_eq!(first, "order_line_item");
        assert_eq!(to_snake_case("OrderLineItem"), first);
    }

    #[test]
    fn test_table_name_override() {
        assert_eq!(table_name("User", Some("accounts")), "accounts");
        assert_eq!(table_name("User", Some("")), "user");
        assert_eq!(table_name("UserConfig", None), "user_config");
    }
}
