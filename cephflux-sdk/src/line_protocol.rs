//! InfluxDB line protocol encoding.
//!
//! ```text
//! ceph_pool_stats,fsid=c0ffee,pool_id=1,pool_name=rbd,type_instance=objects value=42 1700000000000
//! ```

use std::fmt::Write;

use cephflux_types::{Point, Precision};

/// Encode points as newline-separated lines, with timestamps in `precision`.
pub fn encode(points: &[Point], precision: Precision) -> String {
    let mut out = String::with_capacity(points.len() * 96);
    for (i, point) in points.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        encode_point(&mut out, point, precision);
    }
    out
}

/// Append one point, without a trailing newline.
pub fn encode_point(out: &mut String, point: &Point, precision: Precision) {
    escape_into(out, point.measurement().name(), &[',', ' ']);

    for (key, value) in point.tags() {
        out.push(',');
        escape_into(out, key, &[',', '=', ' ']);
        out.push('=');
        escape_into(out, value, &[',', '=', ' ']);
    }

    for (i, (field, value)) in point.fields().enumerate() {
        out.push(if i == 0 { ' ' } else { ',' });
        escape_into(out, field, &[',', '=', ' ']);
        let _ = write!(out, "={value}");
    }

    let _ = write!(out, " {}", point.timestamp().in_precision(precision));
}

fn escape_into(out: &mut String, s: &str, special: &[char]) {
    for c in s.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            c if special.contains(&c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cephflux_types::{tag, Measurement, Timestamp};

    fn pool_point(name: &str, metric: &str, value: f64) -> Point {
        Point::builder(Measurement::PoolStats)
            .tag(tag::POOL_NAME, name)
            .tag(tag::POOL_ID, 1)
            .tag(tag::TYPE_INSTANCE, metric)
            .tag(tag::FSID, "c0ffee")
            .timestamp(Timestamp::from_millis(1_700_000_000_123))
            .value(value)
            .build()
            .unwrap()
    }

    #[test]
    fn encodes_sorted_tags_and_value_field() {
        let line = encode(&[pool_point("rbd", "objects", 42.0)], Precision::Milliseconds);
        assert_eq!(
            line,
            "ceph_pool_stats,fsid=c0ffee,pool_id=1,pool_name=rbd,type_instance=objects value=42 1700000000123"
        );
    }

    #[test]
    fn timestamps_follow_precision() {
        let point = pool_point("rbd", "objects", 1.5);
        assert!(encode(&[point.clone()], Precision::Seconds).ends_with(" value=1.5 1700000000"));
        assert!(encode(&[point], Precision::Nanoseconds).ends_with(" 1700000000123000000"));
    }

    #[test]
    fn escapes_special_characters_in_tags() {
        let line = encode(&[pool_point("my pool,a=b", "objects", 0.0)], Precision::Milliseconds);
        assert!(line.contains(r"pool_name=my\ pool\,a\=b,"));
        assert!(line.contains(" value=0 "));
    }

    #[test]
    fn one_line_per_point() {
        let points = vec![
            pool_point("rbd", "objects", 1.0),
            pool_point("rbd", "dirty", 0.0),
        ];
        let body = encode(&points, Precision::Milliseconds);
        assert_eq!(body.lines().count(), 2);
        assert!(!body.ends_with('\n'));
    }

    #[test]
    fn empty_batch_is_empty_body() {
        assert_eq!(encode(&[], Precision::Milliseconds), "");
    }
}
