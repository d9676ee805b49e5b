use super::policy::ThresholdSpec;

// ---

/// Decide whether the newest `required_count` values form an unbroken breach
/// run.
///
/// `values` must be ordered newest first, with `values[0]` the reading just
/// ingested. Extra history beyond `required_count` is ignored. With fewer
/// values than required there is no breach. Boundary values (equal to `min`
/// or `max`) are inside the policy and break the run.
///
/// The result depends only on `values`; no state carries over between calls.
pub fn is_consecutive_breach(values: &[f64], spec: &ThresholdSpec, required_count: usize) -> bool {
    // ---
    if required_count == 0 || values.len() < required_count {
        return false;
    }

    values[..required_count]
        .iter()
        .all(|&value| spec.is_breach(value))
}
