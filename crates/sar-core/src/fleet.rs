//! Battery health scoring, maintenance forecasting and pre-flight gating.
//!
//! All date arithmetic is relative to an explicit `as_of` instant so results
//! are reproducible.

use crate::error::{EngineError, EngineResult};
use crate::rules::require_positive;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

const DAYS_PER_MONTH: f64 = 30.0;

/// Fleet maintenance rules. Hours are flight hours unless noted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetRules {
    /// Rated charge cycles of a LiPo pack
    pub max_cycles: u32,
    pub cycle_weight: f64,
    pub capacity_weight: f64,
    pub age_weight: f64,
    pub voltage_weight: f64,
    pub expected_life_months: f64,
    /// Age score lost over one expected life
    pub age_penalty: f64,
    /// Variance below this counts as a stable pack
    pub voltage_variance_limit: f64,
    pub voltage_variance_penalty: f64,
    pub replacement_score: f64,
    /// Fraction of `max_cycles` past which replacement is recommended
    pub replacement_cycle_fraction: f64,
    pub motor_flight_hours: f64,
    /// Wall-clock hours since last service
    pub motor_service_interval_hours: f64,
    pub motor_high_priority_hours: f64,
    pub gimbal_drift_deg: f64,
    pub propeller_flight_hours: f64,
    pub gps_error_codes: Vec<String>,
    pub routine_interval_hours: f64,
    pub routine_base_days: i64,
    pub routine_min_days: i64,
    pub battery_check_days: i64,
    pub major_interval_hours: f64,
    /// Major service is scheduled once the hours counter passes this share of the interval
    pub major_due_hours: f64,
    pub major_lead_days: i64,
    /// Battery health below which a drone is not assigned
    pub min_assignment_health: f64,
}

impl Default for FleetRules {
    fn default() -> Self {
        Self {
            max_cycles: 500,
            cycle_weight: 0.3,
            capacity_weight: 0.4,
            age_weight: 0.2,
            voltage_weight: 0.1,
            expected_life_months: 24.0,
            age_penalty: 50.0,
            voltage_variance_limit: 0.5,
            voltage_variance_penalty: 20.0,
            replacement_score: 30.0,
            replacement_cycle_fraction: 0.8,
            motor_flight_hours: 100.0,
            motor_service_interval_hours: 720.0,
            motor_high_priority_hours: 150.0,
            gimbal_drift_deg: 2.0,
            propeller_flight_hours: 50.0,
            gps_error_codes: vec!["GPS_DRIFT".into(), "GPS_LOSS".into()],
            routine_interval_hours: 25.0,
            routine_base_days: 30,
            routine_min_days: 7,
            battery_check_days: 14,
            major_interval_hours: 100.0,
            major_due_hours: 80.0,
            major_lead_days: 21,
            min_assignment_health: 30.0,
        }
    }
}

impl FleetRules {
    /// Divisors of the health and schedule arithmetic must be positive.
    pub fn validate(&self) -> EngineResult<()> {
        if self.max_cycles == 0 {
            return Err(EngineError::invalid_parameter("fleet.max_cycles", "must be > 0"));
        }
        require_positive("fleet.expected_life_months", self.expected_life_months)?;
        require_positive("fleet.routine_interval_hours", self.routine_interval_hours)?;
        require_positive("fleet.major_interval_hours", self.major_interval_hours)?;
        if self.routine_min_days < 0 || self.routine_base_days < self.routine_min_days {
            return Err(EngineError::invalid_parameter(
                "fleet.routine_base_days",
                "must be at least routine_min_days, which must be non-negative",
            ));
        }
        Ok(())
    }
}

/// Battery telemetry as reported by the pack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatteryReport {
    #[serde(default)]
    pub serial: String,
    pub cycle_count: u32,
    /// Remaining capacity in percent of rated capacity
    pub capacity_percent: f64,
    pub manufactured_at: DateTime<Utc>,
    #[serde(default)]
    pub voltage_readings: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatteryHealth {
    pub serial: String,
    /// 0..=100, rounded
    pub health_score: f64,
    pub estimated_cycles_remaining: u32,
    pub recommend_replacement: bool,
    /// Capacity percent lost per cycle, two decimals
    pub degradation_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaintenancePriority {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceIssue {
    MotorBearingWear,
    GimbalDrift,
    PropellerFatigue,
    GpsDegradation,
}

impl MaintenanceIssue {
    pub fn description(self) -> &'static str {
        match self {
            Self::MotorBearingWear => "Motor bearing wear",
            Self::GimbalDrift => "Gimbal calibration drift",
            Self::PropellerFatigue => "Propeller fatigue",
            Self::GpsDegradation => "GPS module degradation",
        }
    }

    pub fn recommended_action(self) -> &'static str {
        match self {
            Self::MotorBearingWear => "Schedule motor inspection and lubrication",
            Self::GimbalDrift => "Recalibrate gimbal and check mounting",
            Self::PropellerFatigue => "Inspect propellers for micro-fractures",
            Self::GpsDegradation => "Replace GPS antenna or module",
        }
    }

    fn lead_days(self) -> i64 {
        match self {
            Self::MotorBearingWear => 7,
            Self::GimbalDrift => 3,
            Self::PropellerFatigue => 14,
            Self::GpsDegradation => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceFinding {
    pub issue: MaintenanceIssue,
    /// Percent
    pub confidence: f64,
    pub recommended_action: String,
    pub due: DateTime<Utc>,
    pub priority: MaintenancePriority,
}

impl MaintenanceFinding {
    fn new(issue: MaintenanceIssue, confidence: f64, priority: MaintenancePriority, as_of: DateTime<Utc>) -> Self {
        Self {
            issue,
            confidence,
            recommended_action: issue.recommended_action().to_string(),
            due: as_of + Duration::days(issue.lead_days()),
            priority,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceMetrics {
    pub gimbal_drift_deg: Option<f64>,
}

/// Pre-flight checklist. Items missing from a document count as failed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PreFlightChecklist {
    pub gps_locked: bool,
    pub compass_calibrated: bool,
    pub battery_voltage_ok: bool,
    pub propellers_secure: bool,
    pub firmware_current: bool,
    pub sensors_operational: bool,
    pub communication_link: bool,
    pub weather_suitable: bool,
    pub airspace_clear: bool,
}

impl PreFlightChecklist {
    pub fn all_clear() -> Self {
        Self {
            gps_locked: true,
            compass_calibrated: true,
            battery_voltage_ok: true,
            propellers_secure: true,
            firmware_current: true,
            sensors_operational: true,
            communication_link: true,
            weather_suitable: true,
            airspace_clear: true,
        }
    }
}

/// Failed check that grounds the drone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreFlightIssue {
    GpsNotLocked,
    CompassUncalibrated,
    BatteryVoltage,
    PropellersLoose,
    SensorMalfunction,
    CommunicationLink,
    AirspaceRestricted,
}

impl PreFlightIssue {
    pub fn message(self) -> &'static str {
        match self {
            Self::GpsNotLocked => "GPS not locked",
            Self::CompassUncalibrated => "Compass needs calibration",
            Self::BatteryVoltage => "Battery voltage out of range",
            Self::PropellersLoose => "Propellers not properly secured",
            Self::SensorMalfunction => "Sensor malfunction detected",
            Self::CommunicationLink => "Communication link unstable",
            Self::AirspaceRestricted => "Airspace restrictions in effect",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreFlightWarning {
    FirmwareOutdated,
    WeatherMarginal,
}

impl PreFlightWarning {
    pub fn message(self) -> &'static str {
        match self {
            Self::FirmwareOutdated => "Firmware update available",
            Self::WeatherMarginal => "Weather conditions marginal",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreFlightResult {
    pub passed: bool,
    pub issues: Vec<PreFlightIssue>,
    pub warnings: Vec<PreFlightWarning>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleKind {
    Routine,
    Battery,
    Major,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledMaintenance {
    pub kind: ScheduleKind,
    pub date: DateTime<Utc>,
    pub description: String,
    pub estimated_duration_min: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EligibilityBlocker {
    PreFlight { issue: PreFlightIssue },
    BatteryReplacement { health_score: f64 },
    BatteryHealth { health_score: f64, minimum: f64 },
    Maintenance { issue: MaintenanceIssue, priority: MaintenancePriority },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentEligibility {
    pub eligible: bool,
    pub blockers: Vec<EligibilityBlocker>,
    /// Non-blocking notes for the operator
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct FleetMaintenancePredictor {
    rules: FleetRules,
}

impl FleetMaintenancePredictor {
    pub fn new(rules: FleetRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &FleetRules {
        &self.rules
    }

    pub fn calculate_battery_health(
        &self,
        cycle_count: u32,
        capacity_percent: f64,
        manufactured_at: DateTime<Utc>,
        voltage_readings: &[f64],
        as_of: DateTime<Utc>,
    ) -> EngineResult<BatteryHealth> {
        if !(capacity_percent.is_finite() && (0.0..=100.0).contains(&capacity_percent)) {
            return Err(EngineError::invalid_parameter(
                "capacity_percent",
                format!("{capacity_percent} is outside 0..=100"),
            ));
        }
        if voltage_readings.iter().any(|v| !v.is_finite()) {
            return Err(EngineError::invalid_parameter(
                "voltage_readings",
                "readings must be finite",
            ));
        }
        let rules = &self.rules;
        let max_cycles = f64::from(rules.max_cycles);
        let cycles = f64::from(cycle_count);

        let cycle_score = if max_cycles > 0.0 {
            (100.0 - cycles / max_cycles * 100.0).max(0.0)
        } else {
            0.0
        };
        let age_months =
            ((as_of - manufactured_at).num_seconds() as f64 / 86_400.0 / DAYS_PER_MONTH).max(0.0);
        let age_score = (100.0 - age_months / rules.expected_life_months * rules.age_penalty).max(0.0);

        let variance = voltage_variance(voltage_readings);
        let voltage_score = if variance < rules.voltage_variance_limit {
            100.0
        } else {
            (100.0 - variance * rules.voltage_variance_penalty).max(0.0)
        };

        let score = cycle_score * rules.cycle_weight
            + capacity_percent * rules.capacity_weight
            + age_score * rules.age_weight
            + voltage_score * rules.voltage_weight;

        let degradation_rate = if cycle_count == 0 {
            0.0
        } else {
            (100.0 - capacity_percent) / cycles
        };

        Ok(BatteryHealth {
            serial: String::new(),
            health_score: score.round(),
            estimated_cycles_remaining: rules.max_cycles.saturating_sub(cycle_count),
            recommend_replacement: score < rules.replacement_score
                || cycles > max_cycles * rules.replacement_cycle_fraction,
            degradation_rate: (degradation_rate * 100.0).round() / 100.0,
        })
    }

    pub fn battery_health(&self, report: &BatteryReport, as_of: DateTime<Utc>) -> EngineResult<BatteryHealth> {
        let mut health = self.calculate_battery_health(
            report.cycle_count,
            report.capacity_percent,
            report.manufactured_at,
            &report.voltage_readings,
            as_of,
        )?;
        health.serial = report.serial.clone();
        if health.recommend_replacement {
            tracing::warn!(
                serial = %report.serial,
                health_score = health.health_score,
                cycles = report.cycle_count,
                "Battery replacement recommended"
            );
        }
        Ok(health)
    }

    /// Every rule fires independently; findings come back in rule order.
    pub fn predict_maintenance<S: AsRef<str>>(
        &self,
        flight_hours: f64,
        error_codes: &[S],
        metrics: &PerformanceMetrics,
        last_maintenance: DateTime<Utc>,
        as_of: DateTime<Utc>,
    ) -> Vec<MaintenanceFinding> {
        let rules = &self.rules;
        let hours_since_service = (as_of - last_maintenance).num_seconds() as f64 / 3600.0;
        let mut findings = Vec::new();

        if flight_hours > rules.motor_flight_hours || hours_since_service > rules.motor_service_interval_hours {
            let priority = if flight_hours > rules.motor_high_priority_hours {
                MaintenancePriority::High
            } else {
                MaintenancePriority::Medium
            };
            findings.push(MaintenanceFinding::new(
                MaintenanceIssue::MotorBearingWear,
                (60.0 + flight_hours / 100.0 * 20.0).min(95.0),
                priority,
                as_of,
            ));
        }

        if metrics
            .gimbal_drift_deg
            .is_some_and(|drift| drift > rules.gimbal_drift_deg)
        {
            findings.push(MaintenanceFinding::new(
                MaintenanceIssue::GimbalDrift,
                85.0,
                MaintenancePriority::Medium,
                as_of,
            ));
        }

        if flight_hours > rules.propeller_flight_hours {
            findings.push(MaintenanceFinding::new(
                MaintenanceIssue::PropellerFatigue,
                70.0 + ((flight_hours - rules.propeller_flight_hours) / 2.0).min(25.0),
                MaintenancePriority::Low,
                as_of,
            ));
        }

        let gps_fault = error_codes
            .iter()
            .any(|code| rules.gps_error_codes.iter().any(|known| known == code.as_ref()));
        if gps_fault {
            findings.push(MaintenanceFinding::new(
                MaintenanceIssue::GpsDegradation,
                90.0,
                MaintenancePriority::High,
                as_of,
            ));
        }

        tracing::debug!(flight_hours, findings = findings.len(), "Maintenance prediction complete");
        findings
    }

    pub fn generate_maintenance_schedule(&self, flight_hours: f64, as_of: DateTime<Utc>) -> Vec<ScheduledMaintenance> {
        let rules = &self.rules;
        let hours_into_routine = flight_hours.rem_euclid(rules.routine_interval_hours);
        let routine_days = ((rules.routine_base_days as f64 - hours_into_routine).trunc() as i64).max(rules.routine_min_days);

        let mut schedule = vec![
            ScheduledMaintenance {
                kind: ScheduleKind::Routine,
                date: as_of + Duration::days(routine_days),
                description: "Routine inspection and cleaning".into(),
                estimated_duration_min: 30,
            },
            ScheduledMaintenance {
                kind: ScheduleKind::Battery,
                date: as_of + Duration::days(rules.battery_check_days),
                description: "Battery health check and calibration".into(),
                estimated_duration_min: 45,
            },
        ];

        if flight_hours.rem_euclid(rules.major_interval_hours) > rules.major_due_hours {
            schedule.push(ScheduledMaintenance {
                kind: ScheduleKind::Major,
                date: as_of + Duration::days(rules.major_lead_days),
                description: "Major service - all components".into(),
                estimated_duration_min: 120,
            });
        }

        schedule.sort_by_key(|item| item.date);
        schedule
    }

    /// Decide whether a drone may take an assignment.
    pub fn assess_assignment_eligibility(
        &self,
        preflight: &PreFlightResult,
        battery: &BatteryHealth,
        findings: &[MaintenanceFinding],
    ) -> AssignmentEligibility {
        let mut blockers: Vec<EligibilityBlocker> = preflight
            .issues
            .iter()
            .map(|&issue| EligibilityBlocker::PreFlight { issue })
            .collect();
        let mut warnings: Vec<String> = preflight
            .warnings
            .iter()
            .map(|warning| warning.message().to_string())
            .collect();

        if battery.recommend_replacement {
            blockers.push(EligibilityBlocker::BatteryReplacement {
                health_score: battery.health_score,
            });
        } else if battery.health_score < self.rules.min_assignment_health {
            blockers.push(EligibilityBlocker::BatteryHealth {
                health_score: battery.health_score,
                minimum: self.rules.min_assignment_health,
            });
        }

        for finding in findings {
            if finding.priority >= MaintenancePriority::High {
                blockers.push(EligibilityBlocker::Maintenance {
                    issue: finding.issue,
                    priority: finding.priority,
                });
            } else {
                warnings.push(format!(
                    "{} due {}",
                    finding.issue.description(),
                    finding.due.format("%Y-%m-%d")
                ));
            }
        }

        AssignmentEligibility {
            eligible: blockers.is_empty(),
            blockers,
            warnings,
        }
    }
}

pub fn validate_pre_flight_check(checks: &PreFlightChecklist) -> PreFlightResult {
    let mut issues = Vec::new();
    let mut warnings = Vec::new();

    let required = [
        (checks.gps_locked, PreFlightIssue::GpsNotLocked),
        (checks.compass_calibrated, PreFlightIssue::CompassUncalibrated),
        (checks.battery_voltage_ok, PreFlightIssue::BatteryVoltage),
        (checks.propellers_secure, PreFlightIssue::PropellersLoose),
        (checks.sensors_operational, PreFlightIssue::SensorMalfunction),
        (checks.communication_link, PreFlightIssue::CommunicationLink),
        (checks.airspace_clear, PreFlightIssue::AirspaceRestricted),
    ];
    for (ok, issue) in required {
        if !ok {
            issues.push(issue);
        }
    }
    if !checks.firmware_current {
        warnings.push(PreFlightWarning::FirmwareOutdated);
    }
    if !checks.weather_suitable {
        warnings.push(PreFlightWarning::WeatherMarginal);
    }

    PreFlightResult {
        passed: issues.is_empty(),
        issues,
        warnings,
    }
}

/// Population variance; an empty series is treated as perfectly stable.
fn voltage_variance(readings: &[f64]) -> f64 {
    if readings.is_empty() {
        return 0.0;
    }
    let n = readings.len() as f64;
    let mean = readings.iter().sum::<f64>() / n;
    readings.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
}
