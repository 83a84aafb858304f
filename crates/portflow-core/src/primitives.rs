//! # Engine Primitives
//!
//! Hardcoded limits and tag conventions for the resolution engine.
//!
//! These values are compiled into the binary. The combination ceiling can be
//! overridden per selector; the others are fixed.

/// Default upper bound on the number of context-state combinations a single
/// resolution run may enumerate.
///
/// The candidate space is the product of every node's state count, so it
/// grows exponentially with the number of context-dependent nodes in one
/// component. Runs above the ceiling fail with `SearchSpaceTooLarge`.
pub const DEFAULT_MAX_COMBINATIONS: usize = 1_000_000;

/// Maximum number of ports a single node instance may allocate.
pub const MAX_PORTS_PER_NODE: usize = 1024;

/// Maximum instance count for one multi-port prefix.
pub const MAX_MULTI_PORT_INSTANCES: usize = 256;

/// Separator between a multi-port prefix and its instance number.
pub const MULTI_PORT_SEPARATOR: char = '_';

// =============================================================================
// TAG CONVENTIONS
// =============================================================================

/// Tag of the `n`-th instance of a multi port: `prefix_n`.
#[must_use]
pub fn multi_port_tag(prefix: &str, n: usize) -> String {
    format!("{prefix}{MULTI_PORT_SEPARATOR}{n}")
}

/// Split a `prefix_n` tag into its prefix and instance number.
///
/// `None` for tags without a numeric suffix.
#[must_use]
pub fn parse_multi_port_tag(tag: &str) -> Option<(&str, usize)> {
    let (prefix, suffix) = tag.rsplit_once(MULTI_PORT_SEPARATOR)?;
    if prefix.is_empty() || suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok().map(|n| (prefix, n))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multi_port_tag_format() {
        assert_eq!(multi_port_tag("inlet", 3), "inlet_3");
    }

    #[test]
    fn parses_numeric_suffix() {
        assert_eq!(parse_multi_port_tag("inlet_3"), Some(("inlet", 3)));
        assert_eq!(parse_multi_port_tag("gas_input_12"), Some(("gas_input", 12)));
        assert_eq!(
            parse_multi_port_tag(&multi_port_tag("outlet", 7)),
            Some(("outlet", 7))
        );
    }

    #[test]
    fn plain_tags_do_not_parse() {
        assert_eq!(parse_multi_port_tag("outlet"), None);
        assert_eq!(parse_multi_port_tag("gas_input"), None);
        assert_eq!(parse_multi_port_tag("trailing_"), None);
        assert_eq!(parse_multi_port_tag("_7"), None);
        assert_eq!(parse_multi_port_tag("x_99999999999999999999999"), None);
    }
}
