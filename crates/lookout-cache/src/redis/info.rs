//! Parsing of the `INFO` report.

use crate::types::CacheMemoryInfo;

/// Value of a `key:value` line in an `INFO` report.
pub(crate) fn extract_info_value<'a>(text: &'a str, key: &str) -> Option<&'a str> {
    text.lines().find_map(|line| {
        let (name, value) = line.trim().split_once(':')?;
        (name == key).then_some(value.trim())
    })
}

fn info_number<T: std::str::FromStr>(text: &str, key: &str) -> Option<T> {
    extract_info_value(text, key).and_then(|v| v.parse().ok())
}

/// Build memory diagnostics from a full `INFO` report.
///
/// Missing or malformed fields stay at their zero value. Hit and miss rates
/// are fractions of all keyspace lookups; `total_keys` sums every `dbN` line.
pub fn parse_memory_info(text: &str) -> CacheMemoryInfo {
    let mut info = CacheMemoryInfo {
        used_memory: info_number(text, "used_memory").unwrap_or(0),
        peak_memory: info_number(text, "used_memory_peak").unwrap_or(0),
        memory_fragmentation: info_number(text, "mem_fragmentation_ratio").unwrap_or(0.0),
        expired_keys: info_number(text, "expired_keys").unwrap_or(0),
        evicted_keys: info_number(text, "evicted_keys").unwrap_or(0),
        total_keys: keyspace_total(text),
        ..CacheMemoryInfo::default()
    };

    let hits: i64 = info_number(text, "keyspace_hits").unwrap_or(0);
    let misses: i64 = info_number(text, "keyspace_misses").unwrap_or(0);
    let lookups = hits + misses;
    if lookups > 0 {
        info.hit_rate = hits as f64 / lookups as f64;
        info.miss_rate = misses as f64 / lookups as f64;
    }
    info
}

/// Sum of `keys=` across `db0:keys=1,expires=0,avg_ttl=0` lines.
fn keyspace_total(text: &str) -> i64 {
    text.lines()
        .filter_map(|line| {
            let (name, fields) = line.trim().split_once(':')?;
            let index = name.strip_prefix("db")?;
            if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            fields
                .split(',')
                .find_map(|field| field.strip_prefix("keys="))
                .and_then(|n| n.parse::<i64>().ok())
        })
        .sum()
}

/// Flatten an `INFO` reply into text.
///
/// Single nodes answer with one bulk or verbatim string; cluster clients may
/// answer with one report per node, which are concatenated.
pub(crate) fn info_text(value: &redis::Value) -> String {
    match value {
        redis::Value::BulkString(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        redis::Value::SimpleString(text) => text.clone(),
        redis::Value::VerbatimString { text, .. } => text.clone(),
        redis::Value::Array(items) | redis::Value::Set(items) => {
            items.iter().map(info_text).collect::<Vec<_>>().join("\n")
        }
        redis::Value::Map(entries) => entries
            .iter()
            .map(|(_, v)| info_text(v))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = "# Memory\r\n\
        used_memory:1048576\r\n\
        used_memory_human:1.00M\r\n\
        used_memory_peak:2097152\r\n\
        mem_fragmentation_ratio:1.25\r\n\
        # Stats\r\n\
        expired_keys:7\r\n\
        evicted_keys:2\r\n\
        keyspace_hits:30\r\n\
        keyspace_misses:10\r\n\
        # Keyspace\r\n\
        db0:keys=12,expires=3,avg_ttl=0\r\n\
        db3:keys=5,expires=5,avg_ttl=1200\r\n";

    #[test]
    fn test_extract_info_value() {
        assert_eq!(extract_info_value(REPORT, "used_memory"), Some("1048576"));
        assert_eq!(extract_info_value(REPORT, "used_memory_human"), Some("1.00M"));
        assert_eq!(extract_info_value(REPORT, "absent"), None);
        assert_eq!(
            extract_info_value("cluster_enabled:0\r\n", "cluster_enabled"),
            Some("0")
        );
    }

    #[test]
    fn test_parse_memory_info() {
        let info = parse_memory_info(REPORT);
        assert_eq!(info.used_memory, 1_048_576);
        assert_eq!(info.peak_memory, 2_097_152);
        assert!((info.memory_fragmentation - 1.25).abs() < f64::EPSILON);
        assert_eq!(info.expired_keys, 7);
        assert_eq!(info.evicted_keys, 2);
        assert_eq!(info.total_keys, 17);
        assert!((info.hit_rate - 0.75).abs() < f64::EPSILON);
        assert!((info.miss_rate - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_empty_report() {
        let info = parse_memory_info("");
        assert_eq!(info.used_memory, 0);
        assert_eq!(info.total_keys, 0);
        assert_eq!(info.hit_rate, 0.0);
    }

    #[test]
    fn test_info_text_flattens_replies() {
        let bulk = redis::Value::BulkString(b"used_memory:10\r\n".to_vec());
        assert_eq!(info_text(&bulk), "used_memory:10\r\n");

        let per_node = redis::Value::Map(vec![
            (
                redis::Value::SimpleString("10.0.0.1:6379".into()),
                redis::Value::BulkString(b"db0:keys=2,expires=0".to_vec()),
            ),
            (
                redis::Value::SimpleString("10.0.0.2:6379".into()),
                redis::Value::BulkString(b"db0:keys=3,expires=0".to_vec()),
            ),
        ]);
        assert_eq!(parse_memory_info(&info_text(&per_node)).total_keys, 5);
    }
}
