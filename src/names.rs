//! Lexical predicates for the names carried in message headers.

const MAX_NAME: usize = 255;

/// Test if a single name element is valid, i.e. non-empty, over the given
/// alphabet and not starting with a digit unless allowed.
fn is_element(element: &str, extra: &[u8], digit_start: bool) -> bool {
    let bytes = element.as_bytes();

    let Some(&first) = bytes.first() else {
        return false;
    };

    if first.is_ascii_digit() && !digit_start {
        return false;
    }

    bytes
        .iter()
        .all(|&b| b.is_ascii_alphanumeric() || b == b'_' || extra.contains(&b))
}

/// Test if the argument is a valid interface name: two or more dot
/// separated elements over `[A-Za-z0-9_]`, none empty or starting with a
/// digit, at most 255 bytes in total.
pub(crate) fn is_interface_name(name: &str) -> bool {
    if name.len() > MAX_NAME {
        return false;
    }

    let mut elements = 0;

    for element in name.split('.') {
        if !is_element(element, &[], false) {
            return false;
        }

        elements += 1;
    }

    elements >= 2
}

/// Test if the argument is a valid error name.
///
/// Error names share the interface name grammar.
pub(crate) fn is_error_name(name: &str) -> bool {
    is_interface_name(name)
}

/// Test if the argument is a valid member name: a single element over
/// `[A-Za-z0-9_]`, not starting with a digit, at most 255 bytes.
pub(crate) fn is_member_name(name: &str) -> bool {
    name.len() <= MAX_NAME && is_element(name, &[], false)
}

/// Test if the argument is a valid bus name, either unique (`:N.M`) or
/// well-known (reverse DNS style, with `-` also permitted).
pub(crate) fn is_bus_name(name: &str) -> bool {
    if name.len() > MAX_NAME {
        return false;
    }

    let (name, unique) = match name.strip_prefix(':') {
        Some(rest) => (rest, true),
        None => (name, false),
    };

    let mut elements = 0;

    for element in name.split('.') {
        if !is_element(element, &[b'-'], unique) {
            return false;
        }

        elements += 1;
    }

    elements >= 2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interface_names() {
        assert!(is_interface_name("org.freedesktop.DBus"));
        assert!(is_interface_name("a.b"));
        assert!(is_interface_name("a_1.b_2"));
        assert!(!is_interface_name("org"));
        assert!(!is_interface_name("org..foo"));
        assert!(!is_interface_name(".org.foo"));
        assert!(!is_interface_name("org.foo."));
        assert!(!is_interface_name("org.1foo"));
        assert!(!is_interface_name("org.foo-bar"));
        assert!(!is_interface_name(&format!("a.{}", "b".repeat(255))));
    }

    #[test]
    fn member_names() {
        assert!(is_member_name("Hello"));
        assert!(is_member_name("Get_Value2"));
        assert!(!is_member_name(""));
        assert!(!is_member_name("1Hello"));
        assert!(!is_member_name("org.foo"));
        assert!(!is_member_name("with space"));
    }

    #[test]
    fn bus_names() {
        assert!(is_bus_name("org.freedesktop.DBus"));
        assert!(is_bus_name("com.example.backup-agent"));
        assert!(is_bus_name(":1.42"));
        assert!(is_bus_name(":1.0.1"));
        assert!(!is_bus_name("org"));
        assert!(!is_bus_name(":1"));
        assert!(!is_bus_name("com.example..foo"));
        assert!(!is_bus_name("com.1example.foo"));
    }
}
