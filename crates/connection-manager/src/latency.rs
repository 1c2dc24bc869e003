use broadcaster_wire::LatencyClass;

/// Pushes a new RTT sample into the rolling window, dropping the
/// oldest once `capacity` is exceeded (spec.md section 4.3.4: "the
/// last N samples in insertion order").
pub fn push_sample(history: &mut Vec<u32>, sample: u32, capacity: usize) {
    history.push(sample);
    if history.len() > capacity {
        history.remove(0);
    }
}

/// `avgLatency = round(mean(samples))`, `jitter = round(population
/// stddev(samples))`.
pub fn avg_and_jitter(samples: &[u32]) -> (u32, u32) {
    if samples.is_empty() {
        return (0, 0);
    }
    let n = samples.len() as f64;
    let mean = samples.iter().map(|&s| s as f64).sum::<f64>() / n;
    let variance = samples
        .iter()
        .map(|&s| {
            let d = s as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    (mean.round() as u32, variance.sqrt().round() as u32)
}

pub struct LatencyThresholds {
    pub max_latency_ms: u32,
    pub max_jitter_ms: u32,
    pub warning_latency_ms: u32,
    pub warning_jitter_ms: u32,
    pub sample_count: usize,
}

impl LatencyThresholds {
    pub fn from_config(config: &broadcaster_wire::Config) -> Self {
        Self {
            max_latency_ms: config.max_latency_ms,
            max_jitter_ms: config.max_jitter_ms,
            warning_latency_ms: config.warning_latency_ms,
            warning_jitter_ms: config.warning_jitter_ms,
            sample_count: config.latency_samples,
        }
    }
}

/// `critical` takes priority over `warning`; classification requires
/// `|samples| >= N`, otherwise always `ok` (spec.md section 4.3.4).
pub fn classify(
    avg_latency: u32,
    jitter: u32,
    sample_len: usize,
    thresholds: &LatencyThresholds,
) -> LatencyClass {
    if sample_len < thresholds.sample_count {
        return LatencyClass::Ok;
    }
    if avg_latency > thresholds.max_latency_ms || jitter > thresholds.max_jitter_ms {
        LatencyClass::Critical
    } else if avg_latency > thresholds.warning_latency_ms || jitter > thresholds.warning_jitter_ms
    {
        LatencyClass::Warning
    } else {
        LatencyClass::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn thresholds() -> LatencyThresholds {
        LatencyThresholds {
            max_latency_ms: 150,
            max_jitter_ms: 50,
            warning_latency_ms: 100,
            warning_jitter_ms: 30,
            sample_count: 5,
        }
    }

    #[test]
    fn push_sample_evicts_oldest_beyond_capacity() {
        let mut history = vec![1, 2, 3];
        push_sample(&mut history, 4, 3);
        assert_eq!(history, vec![2, 3, 4]);
    }

    #[test]
    fn avg_and_jitter_of_uniform_samples_has_zero_jitter() {
        let (avg, jitter) = avg_and_jitter(&[100, 100, 100, 100, 100]);
        assert_eq!(avg, 100);
        assert_eq!(jitter, 0);
    }

    #[test]
    fn avg_and_jitter_matches_population_stddev() {
        // mean = 30, variance = mean((s-30)^2) = (100+0+100)/3 = 66.67 -> sqrt ~= 8.16 -> 8
        let (avg, jitter) = avg_and_jitter(&[20, 30, 40]);
        assert_eq!(avg, 30);
        assert_eq!(jitter, 8);
    }

    #[test]
    fn classification_requires_full_sample_window() {
        let t = thresholds();
        assert_eq!(classify(500, 500, 2, &t), LatencyClass::Ok);
    }

    #[test]
    fn classification_critical_on_latency_breach() {
        let t = thresholds();
        assert_eq!(classify(151, 0, 5, &t), LatencyClass::Critical);
    }

    #[test]
    fn classification_critical_on_jitter_breach() {
        let t = thresholds();
        assert_eq!(classify(0, 51, 5, &t), LatencyClass::Critical);
    }

    #[test]
    fn classification_warning_below_critical() {
        let t = thresholds();
        assert_eq!(classify(101, 0, 5, &t), LatencyClass::Warning);
        assert_eq!(classify(0, 31, 5, &t), LatencyClass::Warning);
    }

    #[test]
    fn classification_ok_within_warning_bounds() {
        let t = thresholds();
        assert_eq!(classify(100, 30, 5, &t), LatencyClass::Ok);
    }
}
