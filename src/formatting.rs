use crate::descriptor::LabelSet;

// <METRIC_NAME>:<VALUE>|<TYPE>|@<SAMPLE_RATE>|#<TAG_KEY_1>:<TAG_VALUE_1>,<TAG_2>

/// Builds the name sent to the agent, joining the optional namespace with a dot.
///
/// The namespace has surrounding spaces trimmed before it is sanitized; both parts then go
/// through [`sanitize_metric_segment`].
pub fn sanitize_metric_name(namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(ns) if !ns.is_empty() => {
            let ns = sanitize_metric_segment(ns.trim_matches(' '));
            let name = sanitize_metric_segment(name);
            let mut out = String::with_capacity(ns.len() + 1 + name.len());
            out.push_str(&ns);
            out.push('.');
            out.push_str(&name);
            out
        }
        _ => sanitize_metric_segment(name),
    }
}

/// Replaces every run of characters outside `[A-Za-z0-9]` with a single underscore.
pub fn sanitize_metric_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    let mut in_run = false;
    for c in segment.chars() {
        if invalid_metric_character(c) {
            if !in_run {
                out.push('_');
                in_run = true;
            }
        } else {
            out.push(c);
            in_run = false;
        }
    }
    out
}

pub fn format_tag(key: &str, value: &str) -> String {
    let mut tag = String::with_capacity(key.len() + 1 + value.len());
    tag.push_str(key);
    tag.push(':');
    tag.push_str(value);
    tag
}

/// Global tags first, then the record's labels in their original order.
pub fn record_tags(global_tags: &[String], labels: &LabelSet) -> Vec<String> {
    let mut tags = Vec::with_capacity(global_tags.len() + labels.len());
    tags.extend_from_slice(global_tags);
    tags.extend(labels.iter().map(|(k, v)| format_tag(k, v)));
    tags
}

pub fn write_metric_line<T>(
    buffer: &mut String,
    name: &str,
    mtype: &str,
    value: T,
    tags: &[String],
    sample_rate: f64,
) where
    T: std::fmt::Display,
{
    buffer.push_str(name);
    buffer.push(':');
    buffer.push_str(value.to_string().as_str());
    buffer.push('|');
    buffer.push_str(mtype);

    if sample_rate < 1.0 {
        buffer.push_str("|@");
        buffer.push_str(sample_rate.to_string().as_str());
    }

    if !tags.is_empty() {
        buffer.push_str("|#");

        let mut first = true;
        for tag in tags {
            if first {
                first = false;
            } else {
                buffer.push(',');
            }
            buffer.push_str(tag);
        }
    }
    buffer.push('\n');
}

#[inline]
fn invalid_metric_character(c: char) -> bool {
    // Essentially, needs to match the regex pattern of [^a-zA-Z0-9].
    !c.is_ascii_alphanumeric()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_collapses_runs() {
        assert_eq!(sanitize_metric_segment("request.latency ms"), "request_latency_ms");
        assert_eq!(sanitize_metric_segment("a--b"), "a_b");
        assert_eq!(sanitize_metric_segment("ALLcaps123"), "ALLcaps123");
        assert_eq!(sanitize_metric_segment("__x__"), "_x_");
        assert_eq!(sanitize_metric_segment("øhno"), "_hno");
    }

    #[test]
    fn namespaced_name() {
        assert_eq!(
            sanitize_metric_name(Some("My Service"), "errors!"),
            "My_Service.errors_"
        );
        assert_eq!(
            sanitize_metric_name(Some("  api "), "http.requests"),
            "api.http_requests"
        );
        assert_eq!(sanitize_metric_name(None, "errors!"), "errors_");
        assert_eq!(sanitize_metric_name(Some(""), "errors"), "errors");
    }

    #[test]
    fn tags_global_first() {
        let labels = LabelSet::new().with("region", "us").with("az", "b");
        let tags = record_tags(&["env:prod".to_string()], &labels);
        assert_eq!(tags, ["env:prod", "region:us", "az:b"]);
    }

    #[test]
    fn metric_lines() {
        let mut buffer = String::new();
        write_metric_line(&mut buffer, "basic.gauge", "g", -3.44, &[], 1.0);
        write_metric_line(
            &mut buffer,
            "basic.counter",
            "c",
            42,
            &["wutang:forever".to_string(), "a:b".to_string()],
            1.0,
        );
        write_metric_line(&mut buffer, "sampled", "h", 12.0, &[], 0.5);
        assert_eq!(
            buffer,
            "basic.gauge:-3.44|g\nbasic.counter:42|c|#wutang:forever,a:b\nsampled:12|h|@0.5\n"
        );
    }
}
