//! Schedule files, inline service specs and utilization analysis

use std::collections::HashSet;
use std::fmt::Display;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use rtseq_scheduler::{SequencerConfig, ServiceConfig, rate_monotonic_priorities};
use serde::{Deserialize, Serialize};

use crate::error::CliError;

/// Smallest tick derived from the service periods.
pub const DEFAULT_TICK_MS: u64 = 1;

const SPEC_FORMAT: &str = "expected NAME:PERIOD_MS:PRIORITY[:CPU[:LOAD_MS]]";

/// One demo service: its sequencer configuration plus a synthetic load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSpec {
    #[serde(flatten)]
    pub service: ServiceConfig,
    /// Busy-loop time per release in milliseconds.
    #[serde(default)]
    pub load_ms: u64,
}

impl ServiceSpec {
    pub fn load(&self) -> Duration {
        Duration::from_millis(self.load_ms)
    }
}

impl FromStr for ServiceSpec {
    type Err = CliError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = spec.split(':').map(str::trim).collect();
        let (name, period, priority, cpu, load) = match fields.as_slice() {
            [name, period, priority] => (*name, *period, *priority, None, None),
            [name, period, priority, cpu] => (*name, *period, *priority, Some(*cpu), None),
            [name, period, priority, cpu, load] => {
                (*name, *period, *priority, Some(*cpu), Some(*load))
            }
            _ => return Err(CliError::invalid_spec(spec, SPEC_FORMAT)),
        };

        if name.is_empty() {
            return Err(CliError::invalid_spec(spec, "service name is empty"));
        }
        let period_ms = parse_field(spec, "PERIOD_MS", period)?;
        let priority = parse_field(spec, "PRIORITY", priority)?;
        let cpu_affinity = match cpu {
            None | Some("" | "-") => None,
            Some(cpu) => Some(parse_field(spec, "CPU", cpu)?),
        };
        let load_ms = match load {
            None | Some("") => 0,
            Some(load) => parse_field(spec, "LOAD_MS", load)?,
        };

        Ok(Self {
            service: ServiceConfig::new(name, priority, cpu_affinity, period_ms),
            load_ms,
        })
    }
}

fn parse_field<T>(spec: &str, field: &str, value: &str) -> Result<T, CliError>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .parse()
        .map_err(|err| CliError::invalid_spec(spec, format!("{field} '{value}': {err}")))
}

/// A complete schedule as read from YAML or JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Schedule {
    /// Shared tick in milliseconds.
    pub tick_ms: Option<u64>,
    pub sequencer: SequencerConfig,
    pub services: Vec<ServiceSpec>,
}

impl Schedule {
    /// Read a schedule file; `.json` files are parsed as JSON, anything
    /// else as YAML.
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let content = fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Ok(serde_json::from_str(&content)?)
        } else {
            Ok(serde_yaml::from_str(&content)?)
        }
    }

    /// Check everything the sequencer would reject before any thread starts.
    pub fn validate(&self) -> Result<(), CliError> {
        if self.services.is_empty() {
            return Err(CliError::NoServices);
        }
        self.sequencer.validate()?;
        if self.tick_ms == Some(0) {
            return Err(CliError::InvalidConfiguration(
                "tick_ms must be greater than 0".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for spec in &self.services {
            spec.service.validate()?;
            if !names.insert(spec.service.name.as_str()) {
                return Err(CliError::InvalidConfiguration(format!(
                    "duplicate service name '{}'",
                    spec.service.name
                )));
            }
        }
        Ok(())
    }

    /// Tick to run with: the explicit value, else the greatest common
    /// divisor of all periods.
    pub fn tick_ms(&self, requested: Option<u64>) -> u64 {
        requested.or(self.tick_ms).unwrap_or_else(|| {
            self.services
                .iter()
                .map(|spec| spec.service.period_ms)
                .fold(0, gcd)
                .max(DEFAULT_TICK_MS)
        })
    }

    /// Replace every service priority with its rate-monotonic rank.
    pub fn apply_rate_monotonic(&mut self, highest: i32) {
        let periods: Vec<u64> = self
            .services
            .iter()
            .map(|spec| spec.service.period_ms)
            .collect();
        let priorities = rate_monotonic_priorities(&periods, highest);
        for (spec, priority) in self.services.iter_mut().zip(priorities) {
            spec.service.priority = priority;
        }
    }

    pub fn utilization(&self) -> Utilization {
        let services: Vec<ServiceLoad> = self
            .services
            .iter()
            .map(|spec| ServiceLoad {
                name: spec.service.name.clone(),
                period_ms: spec.service.period_ms,
                load_ms: spec.load_ms,
                utilization: ratio(spec.load_ms, spec.service.period_ms),
            })
            .collect();
        let total = services.iter().map(|s| s.utilization).sum();
        let bound = liu_layland_bound(services.len());
        Utilization {
            verdict: Verdict::classify(total, bound),
            services,
            total,
            bound,
        }
    }
}

fn gcd(a: u64, b: u64) -> u64 {
    let (mut a, mut b) = (a, b);
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

#[expect(
    clippy::cast_precision_loss,
    reason = "utilization is reported to three decimals"
)]
fn ratio(load_ms: u64, period_ms: u64) -> f64 {
    if period_ms == 0 {
        return 0.0;
    }
    load_ms as f64 / period_ms as f64
}

/// Liu–Layland rate-monotonic bound `n(2^(1/n) - 1)`.
pub fn liu_layland_bound(services: usize) -> f64 {
    if services == 0 {
        return 1.0;
    }
    let n = f64::from(u32::try_from(services).unwrap_or(u32::MAX));
    n * (2f64.powf(n.recip()) - 1.0)
}

/// Per-service share of the CPU.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceLoad {
    pub name: String,
    pub period_ms: u64,
    pub load_ms: u64,
    pub utilization: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// At or below the bound: schedulable under rate-monotonic priorities.
    Schedulable,
    /// Above the bound but at most 1.0: the bound cannot decide.
    Inconclusive,
    /// Above 1.0: no priority assignment can meet every deadline.
    Overloaded,
}

impl Verdict {
    fn classify(total: f64, bound: f64) -> Self {
        if total <= bound {
            Self::Schedulable
        } else if total <= 1.0 {
            Self::Inconclusive
        } else {
            Self::Overloaded
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Self::Schedulable => "schedulable (within the rate-monotonic bound)",
            Self::Inconclusive => "inconclusive (above the bound, below full load)",
            Self::Overloaded => "overloaded (utilization above 1.0)",
        }
    }
}

/// Utilization of a schedule against the Liu–Layland bound.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Utilization {
    pub services: Vec<ServiceLoad>,
    pub total: f64,
    pub bound: f64,
    pub verdict: Verdict,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn spec(name: &str, period_ms: u64, load_ms: u64) -> ServiceSpec {
        ServiceSpec {
            service: ServiceConfig::new(name, 0, None, period_ms),
            load_ms,
        }
    }

    #[test]
    fn test_parse_minimal_spec() -> TestResult {
        let parsed: ServiceSpec = "X:20:50".parse()?;
        assert_eq!(parsed.service.name, "X");
        assert_eq!(parsed.service.period_ms, 20);
        assert_eq!(parsed.service.priority, 50);
        assert_eq!(parsed.service.cpu_affinity, None);
        assert_eq!(parsed.load_ms, 0);
        Ok(())
    }

    #[test]
    fn test_parse_full_spec() -> TestResult {
        let parsed: ServiceSpec = "Y:50:40:1:5".parse()?;
        assert_eq!(parsed.service.cpu_affinity, Some(1));
        assert_eq!(parsed.load_ms, 5);

        let no_cpu: ServiceSpec = "Z:100:10:-:7".parse()?;
        assert_eq!(no_cpu.service.cpu_affinity, None);
        assert_eq!(no_cpu.load_ms, 7);
        Ok(())
    }

    #[test]
    fn test_parse_rejects_malformed_specs() {
        for bad in ["X", "X:20", ":20:1", "X:abc:1", "X:20:high", "X:20:1:a", "X:1:2:3:4:5"] {
            let result = bad.parse::<ServiceSpec>();
            assert!(
                matches!(result, Err(CliError::InvalidServiceSpec { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_zero_period_parses_but_fails_validation() -> TestResult {
        let schedule = Schedule {
            services: vec!["X:0:1".parse()?],
            ..Schedule::default()
        };
        let result = schedule.validate();
        assert!(matches!(result, Err(CliError::Sequencer(_))));
        assert!(result.is_err_and(|err| err.is_config_error()));
        Ok(())
    }

    #[test]
    fn test_validate_rejects_empty_and_duplicates() {
        assert!(matches!(
            Schedule::default().validate(),
            Err(CliError::NoServices)
        ));

        let duplicated = Schedule {
            services: vec![spec("X", 10, 0), spec("X", 20, 0)],
            ..Schedule::default()
        };
        assert!(matches!(
            duplicated.validate(),
            Err(CliError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_load_yaml_schedule() -> TestResult {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile()?;
        writeln!(
            file,
            "tick_ms: 10\nsequencer:\n  release_backlog: 4\nservices:\n  - name: X\n    priority: 50\n    period_ms: 20\n    load_ms: 2\n  - name: Y\n    priority: 40\n    cpu_affinity: 0\n    period_ms: 50\n"
        )?;

        let schedule = Schedule::load(file.path())?;
        schedule.validate()?;
        assert_eq!(schedule.tick_ms, Some(10));
        assert_eq!(schedule.sequencer.release_backlog, 4);
        assert!(schedule.sequencer.handle_termination_signals);
        assert_eq!(schedule.services.len(), 2);
        assert_eq!(schedule.services.first().map(|s| s.load_ms), Some(2));
        assert_eq!(
            schedule.services.get(1).and_then(|s| s.service.cpu_affinity),
            Some(0)
        );
        Ok(())
    }

    #[test]
    fn test_load_json_schedule() -> TestResult {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile()?;
        write!(
            file,
            r#"{{"services": [{{"name": "X", "priority": 1, "period_ms": 20}}]}}"#
        )?;

        let schedule = Schedule::load(file.path())?;
        assert_eq!(schedule.tick_ms, None);
        assert_eq!(schedule.sequencer, SequencerConfig::default());
        assert_eq!(schedule.services.len(), 1);
        Ok(())
    }

    #[test]
    fn test_tick_defaults_to_period_gcd() {
        let schedule = Schedule {
            services: vec![spec("X", 20, 0), spec("Y", 50, 0)],
            ..Schedule::default()
        };
        assert_eq!(schedule.tick_ms(None), 10);
        assert_eq!(schedule.tick_ms(Some(5)), 5);

        let coprime = Schedule {
            services: vec![spec("X", 7, 0), spec("Y", 11, 0)],
            ..Schedule::default()
        };
        assert_eq!(coprime.tick_ms(None), 1);

        let from_file = Schedule {
            tick_ms: Some(4),
            ..coprime
        };
        assert_eq!(from_file.tick_ms(None), 4);
    }

    #[test]
    fn test_rate_monotonic_assignment() {
        let mut schedule = Schedule {
            services: vec![spec("slow", 100, 0), spec("fast", 10, 0), spec("mid", 50, 0)],
            ..Schedule::default()
        };
        schedule.apply_rate_monotonic(99);
        let priorities: Vec<i32> = schedule
            .services
            .iter()
            .map(|s| s.service.priority)
            .collect();
        assert_eq!(priorities, vec![97, 99, 98]);
    }

    #[test]
    fn test_liu_layland_bound() {
        assert!((liu_layland_bound(1) - 1.0).abs() < 1e-9);
        assert!((liu_layland_bound(2) - 0.828_427).abs() < 1e-6);
        assert!((liu_layland_bound(3) - 0.779_763).abs() < 1e-6);
        assert!(liu_layland_bound(10_000) > std::f64::consts::LN_2);
    }

    #[test]
    fn test_utilization_verdicts() {
        let light = Schedule {
            services: vec![spec("X", 20, 5), spec("Y", 50, 10)],
            ..Schedule::default()
        };
        let report = light.utilization();
        assert!((report.total - 0.45).abs() < 1e-9);
        assert_eq!(report.verdict, Verdict::Schedulable);

        let tight = Schedule {
            services: vec![spec("X", 10, 5), spec("Y", 20, 9)],
            ..Schedule::default()
        };
        assert_eq!(tight.utilization().verdict, Verdict::Inconclusive);

        let heavy = Schedule {
            services: vec![spec("X", 10, 8), spec("Y", 10, 8)],
            ..Schedule::default()
        };
        assert_eq!(heavy.utilization().verdict, Verdict::Overloaded);
    }
}
