//! Container ID discovery.
//!
//! Parses `/proc/self/cgroup` looking for a container identifier in one of
//! the shapes real container runtimes embed in cgroup paths: a 64-character
//! hex container ID (Docker/containerd) or a UUID-shaped task ID (ECS
//! Fargate), optionally wrapped in a runtime-specific prefix/suffix
//! (`docker-...scope`, `libpod-...`, `...service`). Hand-rolled matching
//! rather than a regex engine, in the same spirit as the DNS wire parser:
//! the three shapes are fixed and small enough that char-class checks read
//! more directly than a regex would.

const CGROUP_PATH: &str = "/proc/self/cgroup";

/// Attempts to discover the current process's container ID. Returns `None`
/// on any failure (file missing, no recognizable ID in any line); the
/// transport simply omits the `Datadog-Container-ID` header in that case.
pub fn discover_container_id() -> Option<String> {
    let contents = match std::fs::read_to_string(CGROUP_PATH) {
        Ok(contents) => contents,
        Err(err) => {
            tracing::debug!(error = %err, path = CGROUP_PATH, "no cgroup file, running bare-metal?");
            return None;
        }
    };
    let id = find_container_id(&contents);
    if id.is_none() {
        tracing::debug!("no recognizable container id in cgroup file");
    }
    id
}

/// Scans the raw contents of a cgroup file for a container ID, one line at
/// a time, returning the first match.
fn find_container_id(contents: &str) -> Option<String> {
    for line in contents.lines() {
        if let Some(id) = container_id_in_line(line) {
            return Some(id);
        }
    }
    None
}

/// A cgroup line is `hierarchy-id:controller-list:cgroup-path`. Only the
/// path carries the identifier we want.
fn container_id_in_line(line: &str) -> Option<String> {
    let path = line.splitn(3, ':').nth(2)?;
    path.split('/')
        .rev()
        .filter(|segment| !segment.is_empty())
        .find_map(extract_id_from_segment)
}

/// Strips known runtime prefixes/suffixes off one path segment, then tests
/// the remainder against the two recognized ID shapes.
fn extract_id_from_segment(segment: &str) -> Option<String> {
    let mut candidate = segment;
    for suffix in [".scope", ".service"] {
        candidate = candidate.strip_suffix(suffix).unwrap_or(candidate);
    }
    for prefix in ["docker-", "libpod-", "crio-"] {
        candidate = candidate.strip_prefix(prefix).unwrap_or(candidate);
    }

    // Some systemd-cgroup layouts append a task counter after the
    // container ID itself, e.g. "<hex64>-1234". Trim one trailing
    // "-<digits>" group before testing the hex64 shape.
    let hex_candidate = match candidate.rsplit_once('-') {
        Some((head, tail)) if !tail.is_empty() && tail.bytes().all(|b| b.is_ascii_digit()) => head,
        _ => candidate,
    };

    if is_hex64(hex_candidate) {
        return Some(hex_candidate.to_string());
    }
    if is_uuid(candidate) {
        return Some(candidate.to_string());
    }
    None
}

fn is_hex64(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// `8-4-4-4-12` lowercase-or-uppercase hex groups.
fn is_uuid(s: &str) -> bool {
    let groups: Vec<&str> = s.split('-').collect();
    let expected_lens = [8, 4, 4, 4, 12];
    groups.len() == expected_lens.len()
        && groups
            .iter()
            .zip(expected_lens)
            .all(|(g, len)| g.len() == len && g.bytes().all(|b| b.is_ascii_hexdigit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_docker_style_hex64_id() {
        let id = "a".repeat(64);
        let contents = format!("12:pids:/docker/{id}\n11:cpu:/docker/{id}\n");
        assert_eq!(find_container_id(&contents), Some(id));
    }

    #[test]
    fn finds_systemd_scope_wrapped_id() {
        let id = "b".repeat(64);
        let contents = format!("0::/system.slice/docker-{id}.scope\n");
        assert_eq!(find_container_id(&contents), Some(id));
    }

    #[test]
    fn finds_ecs_fargate_task_uuid() {
        let contents =
            "1:name=systemd:/ecs/5bc5e3e9-8b4e-4e9a-8e4a-7a3bce9b9f9f/task\n".to_string();
        assert_eq!(
            find_container_id(&contents),
            Some("5bc5e3e9-8b4e-4e9a-8e4a-7a3bce9b9f9f".to_string())
        );
    }

    #[test]
    fn returns_none_for_host_cgroup_with_no_container() {
        let contents = "0::/init.scope\n1:name=systemd:/\n";
        assert_eq!(find_container_id(contents), None);
    }

    #[test]
    fn rejects_segments_that_are_nearly_but_not_quite_hex64() {
        let almost = "g".repeat(64); // not hex
        let contents = format!("0::/docker/{almost}\n");
        assert_eq!(find_container_id(&contents), None);
    }
}
