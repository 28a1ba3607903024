//! Topic name and topic filter rules
//!
//! Pure functions: validation of publish topics and subscription filters, and
//! matching a concrete topic against a filter (`+`, `#`, `$share/<group>/`).

use crate::error::{MqttError, MqttResult};

const MAX_TOPIC_LEN: usize = 65_535;
const SHARED_PREFIX: &str = "$share/";

fn check_common(topic: &str) -> MqttResult<()> {
    if topic.is_empty() {
        return Err(MqttError::invalid_topic(topic, "topic must not be empty"));
    }
    if topic.len() > MAX_TOPIC_LEN {
        return Err(MqttError::invalid_topic(
            topic,
            format!("topic exceeds {MAX_TOPIC_LEN} bytes"),
        ));
    }
    if topic.contains('\0') {
        return Err(MqttError::invalid_topic(topic, "topic contains a NUL character"));
    }
    Ok(())
}

/// Validate a topic used for publishing (no wildcards)
pub fn validate_topic_name(topic: &str) -> MqttResult<()> {
    check_common(topic)?;
    if topic.contains(['+', '#']) {
        return Err(MqttError::invalid_topic(
            topic,
            "wildcards are not allowed in a publish topic",
        ));
    }
    Ok(())
}

/// Validate a subscription filter
pub fn validate_topic_filter(filter: &str) -> MqttResult<()> {
    check_common(filter)?;

    let levels = match filter.strip_prefix(SHARED_PREFIX) {
        Some(rest) => {
            let (group, inner) = rest.split_once('/').ok_or_else(|| {
                MqttError::invalid_topic(filter, "shared subscription has no topic filter")
            })?;
            if group.is_empty() || group.contains(['+', '#']) {
                return Err(MqttError::invalid_topic(
                    filter,
                    "shared subscription group name is invalid",
                ));
            }
            if inner.is_empty() {
                return Err(MqttError::invalid_topic(
                    filter,
                    "shared subscription has no topic filter",
                ));
            }
            inner
        }
        None => filter,
    };

    let parts: Vec<&str> = levels.split('/').collect();
    for (index, level) in parts.iter().enumerate() {
        if level.contains('#') && (*level != "#" || index != parts.len() - 1) {
            return Err(MqttError::invalid_topic(
                filter,
                "'#' must occupy the last level on its own",
            ));
        }
        if level.contains('+') && *level != "+" {
            return Err(MqttError::invalid_topic(
                filter,
                "'+' must occupy an entire level",
            ));
        }
    }
    Ok(())
}

/// Filter with any `$share/<group>/` prefix removed
pub fn effective_filter(filter: &str) -> &str {
    filter
        .strip_prefix(SHARED_PREFIX)
        .and_then(|rest| rest.split_once('/'))
        .map(|(_, inner)| inner)
        .unwrap_or(filter)
}

/// Does `topic` match subscription `filter`?
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    let filter = effective_filter(filter);
    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');

    // Leading wildcards never match $-prefixed system topics
    if topic.starts_with('$') && (filter.starts_with('+') || filter.starts_with('#')) {
        return false;
    }

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => continue,
            (Some(f), Some(t)) if f == t => continue,
            (None, None) => return true,
            _ => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_name_validation() {
        assert!(validate_topic_name("sensors/temp").is_ok());
        assert!(validate_topic_name("/leading/slash").is_ok());
        assert!(matches!(
            validate_topic_name(""),
            Err(MqttError::InvalidTopic { .. })
        ));
        assert!(validate_topic_name("sensors/+").is_err());
        assert!(validate_topic_name("sensors/#").is_err());
        assert!(validate_topic_name("bad\0topic").is_err());
    }

    #[test]
    fn test_filter_validation() {
        for valid in ["#", "+", "a/+/c", "a/b/#", "+/+", "$share/group/a/#", "$SYS/#"] {
            assert!(validate_topic_filter(valid).is_ok(), "{valid} should be valid");
        }
        for invalid in ["", "a/#/c", "a/b#", "a/+b", "$share/group", "$share//a", "$share/g+/a"] {
            assert!(validate_topic_filter(invalid).is_err(), "{invalid} should be invalid");
        }
    }

    #[test]
    fn test_topic_matching() {
        assert!(topic_matches("sensors/temp", "sensors/temp"));
        assert!(topic_matches("sensors/+", "sensors/temp"));
        assert!(topic_matches("sensors/#", "sensors/temp/room1"));
        assert!(topic_matches("sensors/#", "sensors"));
        assert!(topic_matches("+/+/room1", "sensors/temp/room1"));
        assert!(topic_matches("#", "anything/at/all"));

        assert!(!topic_matches("sensors/+", "sensors/temp/room1"));
        assert!(!topic_matches("sensors/temp", "sensors/humidity"));
        assert!(!topic_matches("sensors/temp/room1", "sensors/temp"));
    }

    #[test]
    fn test_system_topics_skip_leading_wildcards() {
        assert!(!topic_matches("#", "$SYS/broker/uptime"));
        assert!(!topic_matches("+/broker/uptime", "$SYS/broker/uptime"));
        assert!(topic_matches("$SYS/#", "$SYS/broker/uptime"));
    }

    #[test]
    fn test_shared_subscription_matching() {
        assert_eq!(effective_filter("$share/workers/jobs/+"), "jobs/+");
        assert_eq!(effective_filter("jobs/+"), "jobs/+");
        assert!(topic_matches("$share/workers/jobs/+", "jobs/42"));
        assert!(!topic_matches("$share/workers/jobs/+", "other/42"));
    }
}
