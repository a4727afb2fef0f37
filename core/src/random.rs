//! Empirically calibrated random variables for the HTTP traffic model.
//!
//! Every named variable comes in two flavours:
//! - `Default`: the unconfigured, degenerate distribution. It samples `0.0` and
//!   reports an average of `0.0`. Callers that want traffic must configure it.
//! - `calibrated()` / `new(..)`: the configured distribution. Parameters are
//!   validated here, so sampling cannot fail later.
//!
//! Samples are always finite and non-negative.

use crate::error::{check_param, ConfigError};
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Distribution, Exp, Geometric, LogNormal, Poisson, Weibull};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Calibration table. Times are in seconds, sizes in bytes.
pub mod calibration {
    /// Reference mean inter-arrival of new flows at rate 1.
    pub const FLOW_ARRIVE_MEAN: f64 = 4.3018;
    /// Component 0: gaps inside a burst of flows. Component 1: idle gap between bursts.
    pub const FLOW_ARRIVE_COMPONENT_MEANS: [f64; 2] = [0.0262, 3.32];
    pub const FLOW_IDLE_SHAPE: f64 = 0.7;

    pub const P_SINGLE_PAGE: f64 = 0.82;
    pub const PAGE_GEOMETRIC_P: f64 = 0.4;
    pub const MAX_PAGES: u64 = 1_000;

    pub const P_SINGLE_OBJECT: f64 = 0.69;
    pub const OBJECT_GEOMETRIC_P: f64 = 0.15;
    pub const MAX_OBJECTS: u64 = 1_000;

    pub const P_PERSISTENT: f64 = 0.09;

    /// (mu, sigma) of the log-normal size laws.
    pub const SINGLE_OBJ_SIZE: (f64, f64) = (8.5, 1.3);
    pub const PERSIST_RSP_SIZE: (f64, f64) = (7.6, 1.4);
    pub const NON_PERSIST_RSP_SIZE: (f64, f64) = (8.0, 1.5);
    pub const REQ_SIZE: (f64, f64) = (5.9, 0.5);
    pub const MAX_OBJECT_BYTES: f64 = 10_000_000.0;

    pub const TIME_BTWN_PAGES: (f64, f64) = (2.0, 1.2);
    pub const MAX_PAGE_GAP_SECS: f64 = 600.0;
    pub const TIME_BTWN_OBJS: (f64, f64) = (-2.0, 1.0);
    pub const MAX_OBJECT_GAP_SECS: f64 = 30.0;

    pub const SERVER_DELAY_SHAPE: f64 = 0.63;
    pub const SERVER_DELAY_SCALE: f64 = 0.0305;
    pub const MAX_SERVER_DELAY_SECS: f64 = 10.0;
}

use calibration::*;

/// Capability shared by every traffic variable.
pub trait HttpRandomVariable {
    /// One non-negative, finite draw.
    fn sample(&self, rng: &mut StdRng) -> f64;
    /// Reference mean of the configured distribution, `0.0` when unconfigured.
    fn average(&self) -> f64;
    /// Mean of one mixture component. Plain distributions have a single component.
    fn average_of(&self, _component: usize) -> f64 {
        self.average()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariableKind {
    FlowArrive,
    NumPages,
    ObjsPerPage,
    SingleObj,
    PersistRspSize,
    NonPersistRspSize,
    ReqSize,
    TimeBtwnPages,
    TimeBtwnObjs,
    ServerDelay,
    Persistent,
}

fn sanitize(x: f64, floor: f64, cap: f64) -> f64 {
    if x.is_finite() {
        x.clamp(floor, cap)
    } else {
        cap
    }
}

/// Lanczos approximation (g = 7) of the gamma function.
pub(crate) fn gamma(x: f64) -> f64 {
    const G: f64 = 7.0;
    const COEF: [f64; 9] = [
        0.999_999_999_999_809_9,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_1,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_311_6e-7,
    ];
    if x < 0.5 {
        PI / ((PI * x).sin() * gamma(1.0 - x))
    } else {
        let x = x - 1.0;
        let t = x + G + 0.5;
        let mut a = COEF[0];
        for (i, c) in COEF.iter().enumerate().skip(1) {
            a += c / (x + i as f64);
        }
        (2.0 * PI).sqrt() * t.powf(x + 0.5) * (-t).exp() * a
    }
}

trait Shape {
    fn draw(&self, rng: &mut StdRng) -> f64;
    fn mean(&self) -> f64;
}

#[derive(Debug, Clone)]
struct LogNormalShape {
    dist: LogNormal<f64>,
    mu: f64,
    sigma: f64,
    floor: f64,
    cap: f64,
}

impl LogNormalShape {
    fn new(
        variable: &'static str,
        (mu, sigma): (f64, f64),
        floor: f64,
        cap: f64,
    ) -> Result<Self, ConfigError> {
        check_param(variable, mu.is_finite(), || format!("location {mu} is not finite"))?;
        check_param(variable, sigma.is_finite() && sigma >= 0.0, || {
            format!("scale {sigma} must be finite and non-negative")
        })?;
        check_param(variable, floor >= 0.0 && floor <= cap, || {
            format!("bounds [{floor}, {cap}] are invalid")
        })?;
        let dist = LogNormal::new(mu, sigma).map_err(|e| ConfigError::InvalidParameter {
            variable,
            reason: e.to_string(),
        })?;
        Ok(Self { dist, mu, sigma, floor, cap })
    }
}

impl Shape for LogNormalShape {
    fn draw(&self, rng: &mut StdRng) -> f64 {
        sanitize(self.dist.sample(rng), self.floor, self.cap)
    }

    fn mean(&self) -> f64 {
        (self.mu + self.sigma * self.sigma / 2.0).exp()
    }
}

#[derive(Debug, Clone)]
struct WeibullShape {
    dist: Weibull<f64>,
    shape: f64,
    scale: f64,
    cap: f64,
}

impl WeibullShape {
    fn new(variable: &'static str, shape: f64, scale: f64, cap: f64) -> Result<Self, ConfigError> {
        check_param(variable, shape.is_finite() && shape > 0.0, || {
            format!("shape {shape} must be positive")
        })?;
        check_param(variable, scale.is_finite() && scale > 0.0, || {
            format!("scale {scale} must be positive")
        })?;
        let dist = Weibull::new(scale, shape).map_err(|e| ConfigError::InvalidParameter {
            variable,
            reason: e.to_string(),
        })?;
        Ok(Self { dist, shape, scale, cap })
    }

    fn with_mean(variable: &'static str, shape: f64, mean: f64, cap: f64) -> Result<Self, ConfigError> {
        check_param(variable, shape.is_finite() && shape > 0.0, || {
            format!("shape {shape} must be positive")
        })?;
        Self::new(variable, shape, mean / gamma(1.0 + 1.0 / shape), cap)
    }
}

impl Shape for WeibullShape {
    fn draw(&self, rng: &mut StdRng) -> f64 {
        sanitize(self.dist.sample(rng), 0.0, self.cap)
    }

    fn mean(&self) -> f64 {
        self.scale * gamma(1.0 + 1.0 / self.shape)
    }
}

/// `1` with probability `p_single`, otherwise `2 + Geometric(p_tail)`.
#[derive(Debug, Clone)]
struct CountShape {
    p_single: f64,
    p_tail: f64,
    tail: Geometric,
    max: u64,
}

impl CountShape {
    fn new(variable: &'static str, p_single: f64, p_tail: f64, max: u64) -> Result<Self, ConfigError> {
        check_param(variable, (0.0..=1.0).contains(&p_single), || {
            format!("single probability {p_single} outside [0, 1]")
        })?;
        check_param(variable, p_tail > 0.0 && p_tail <= 1.0, || {
            format!("tail probability {p_tail} outside (0, 1]")
        })?;
        check_param(variable, max >= 1, || "maximum must be at least 1".to_string())?;
        let tail = Geometric::new(p_tail).map_err(|e| ConfigError::InvalidParameter {
            variable,
            reason: e.to_string(),
        })?;
        Ok(Self { p_single, p_tail, tail, max })
    }
}

impl Shape for CountShape {
    fn draw(&self, rng: &mut StdRng) -> f64 {
        if rng.gen_bool(self.p_single) {
            1.0
        } else {
            2u64.saturating_add(self.tail.sample(rng)).min(self.max) as f64
        }
    }

    fn mean(&self) -> f64 {
        let tail_mean = 2.0 + (1.0 - self.p_tail) / self.p_tail;
        self.p_single + (1.0 - self.p_single) * tail_mean
    }
}

#[derive(Debug, Clone)]
struct BernoulliShape {
    p: f64,
}

impl BernoulliShape {
    fn new(variable: &'static str, p: f64) -> Result<Self, ConfigError> {
        check_param(variable, (0.0..=1.0).contains(&p), || {
            format!("probability {p} outside [0, 1]")
        })?;
        Ok(Self { p })
    }
}

impl Shape for BernoulliShape {
    fn draw(&self, rng: &mut StdRng) -> f64 {
        if rng.gen_bool(self.p) {
            1.0
        } else {
            0.0
        }
    }

    fn mean(&self) -> f64 {
        self.p
    }
}

macro_rules! http_variables {
    ($($(#[$doc:meta])* $name:ident($shape:ty)),* $(,)?) => {
        $(
            $(#[$doc])*
            #[derive(Debug, Clone, Default)]
            pub struct $name {
                shape: Option<$shape>,
            }

            impl $name {
                pub fn is_configured(&self) -> bool {
                    self.shape.is_some()
                }
            }

            impl HttpRandomVariable for $name {
                fn sample(&self, rng: &mut StdRng) -> f64 {
                    self.shape.as_ref().map_or(0.0, |s| s.draw(rng))
                }

                fn average(&self) -> f64 {
                    self.shape.as_ref().map_or(0.0, |s| s.mean())
                }
            }
        )*
    };
}

http_variables!(
    /// Pages in one session.
    NumPagesVariable(CountShape),
    /// Objects on one page, primary document included.
    ObjsPerPageVariable(CountShape),
    /// Size of a page's primary object, in bytes.
    SingleObjVariable(LogNormalShape),
    /// Size of an embedded object served over a persistent connection.
    PersistRspSizeVariable(LogNormalShape),
    /// Size of an embedded object served over a fresh connection.
    NonPersistRspSizeVariable(LogNormalShape),
    /// Size of a request, in bytes.
    ReqSizeVariable(LogNormalShape),
    /// Think time between pages, in seconds.
    TimeBtwnPagesVariable(LogNormalShape),
    /// Gap between consecutive object requests of a page, in seconds.
    TimeBtwnObjsVariable(LogNormalShape),
    /// Server processing time, in seconds.
    ServerDelayVariable(WeibullShape),
    /// `1.0` when a page should use a persistent connection.
    PersistentVariable(BernoulliShape),
);

impl NumPagesVariable {
    pub fn new(p_single: f64, p_tail: f64) -> Result<Self, ConfigError> {
        let shape = CountShape::new("num_pages", p_single, p_tail, MAX_PAGES)?;
        Ok(Self { shape: Some(shape) })
    }

    pub fn calibrated() -> Result<Self, ConfigError> {
        Self::new(P_SINGLE_PAGE, PAGE_GEOMETRIC_P)
    }
}

impl ObjsPerPageVariable {
    pub fn new(p_single: f64, p_tail: f64) -> Result<Self, ConfigError> {
        let shape = CountShape::new("objs_per_page", p_single, p_tail, MAX_OBJECTS)?;
        Ok(Self { shape: Some(shape) })
    }

    pub fn calibrated() -> Result<Self, ConfigError> {
        Self::new(P_SINGLE_OBJECT, OBJECT_GEOMETRIC_P)
    }
}

macro_rules! log_normal_ctor {
    ($name:ident, $label:literal, $params:expr, $floor:expr, $cap:expr) => {
        impl $name {
            pub fn new(mu: f64, sigma: f64) -> Result<Self, ConfigError> {
                let shape = LogNormalShape::new($label, (mu, sigma), $floor, $cap)?;
                Ok(Self { shape: Some(shape) })
            }

            pub fn calibrated() -> Result<Self, ConfigError> {
                let (mu, sigma) = $params;
                Self::new(mu, sigma)
            }
        }
    };
}

log_normal_ctor!(SingleObjVariable, "single_obj", SINGLE_OBJ_SIZE, 1.0, MAX_OBJECT_BYTES);
log_normal_ctor!(PersistRspSizeVariable, "persist_rsp_size", PERSIST_RSP_SIZE, 1.0, MAX_OBJECT_BYTES);
log_normal_ctor!(
    NonPersistRspSizeVariable,
    "non_persist_rsp_size",
    NON_PERSIST_RSP_SIZE,
    1.0,
    MAX_OBJECT_BYTES
);
log_normal_ctor!(ReqSizeVariable, "req_size", REQ_SIZE, 1.0, MAX_OBJECT_BYTES);
log_normal_ctor!(TimeBtwnPagesVariable, "time_btwn_pages", TIME_BTWN_PAGES, 0.0, MAX_PAGE_GAP_SECS);
log_normal_ctor!(TimeBtwnObjsVariable, "time_btwn_objs", TIME_BTWN_OBJS, 0.0, MAX_OBJECT_GAP_SECS);

impl ServerDelayVariable {
    pub fn new(shape: f64, scale: f64) -> Result<Self, ConfigError> {
        let shape = WeibullShape::new("server_delay", shape, scale, MAX_SERVER_DELAY_SECS)?;
        Ok(Self { shape: Some(shape) })
    }

    pub fn calibrated() -> Result<Self, ConfigError> {
        Self::new(SERVER_DELAY_SHAPE, SERVER_DELAY_SCALE)
    }
}

impl PersistentVariable {
    pub fn new(p: f64) -> Result<Self, ConfigError> {
        Ok(Self { shape: Some(BernoulliShape::new("persistent", p)?) })
    }

    pub fn calibrated() -> Result<Self, ConfigError> {
        Self::new(P_PERSISTENT)
    }
}

#[derive(Debug, Clone)]
struct FlowArriveShape {
    rate: f64,
    burst_gap: Exp<f64>,
    idle_gap: WeibullShape,
    burst_len: Poisson<f64>,
    burst_mean: f64,
}

/// Gap between consecutive flow (session) arrivals.
///
/// A gap is one idle period (component 1, Weibull) followed by a Poisson number of
/// short in-burst gaps (component 0, exponential). Every mean scales with `1 / rate`.
#[derive(Debug, Clone, Default)]
pub struct FlowArriveVariable {
    shape: Option<FlowArriveShape>,
}

impl FlowArriveVariable {
    pub fn new(rate: f64) -> Result<Self, ConfigError> {
        check_param("flow_arrive", rate.is_finite() && rate > 0.0, || {
            format!("rate {rate} must be positive")
        })?;
        let [short, idle] = FLOW_ARRIVE_COMPONENT_MEANS;
        let burst_mean = (FLOW_ARRIVE_MEAN - idle) / short;
        let invalid = |e: String| ConfigError::InvalidParameter {
            variable: "flow_arrive",
            reason: e,
        };
        let burst_gap = Exp::new(rate / short).map_err(|e| invalid(e.to_string()))?;
        let burst_len = Poisson::new(burst_mean).map_err(|e| invalid(e.to_string()))?;
        let idle_gap = WeibullShape::with_mean("flow_arrive", FLOW_IDLE_SHAPE, idle / rate, f64::MAX)?;
        Ok(Self {
            shape: Some(FlowArriveShape { rate, burst_gap, idle_gap, burst_len, burst_mean }),
        })
    }

    pub fn rate(&self) -> f64 {
        self.shape.as_ref().map_or(0.0, |s| s.rate)
    }
}

impl HttpRandomVariable for FlowArriveVariable {
    fn sample(&self, rng: &mut StdRng) -> f64 {
        let Some(s) = &self.shape else { return 0.0 };
        let bursts = s.burst_len.sample(rng) as u64;
        let short: f64 = (0..bursts).map(|_| s.burst_gap.sample(rng)).sum();
        sanitize(s.idle_gap.draw(rng) + short, 0.0, f64::MAX)
    }

    fn average(&self) -> f64 {
        self.shape
            .as_ref()
            .map_or(0.0, |s| (FLOW_ARRIVE_COMPONENT_MEANS[1] + s.burst_mean * FLOW_ARRIVE_COMPONENT_MEANS[0]) / s.rate)
    }

    fn average_of(&self, component: usize) -> f64 {
        match (&self.shape, FLOW_ARRIVE_COMPONENT_MEANS.get(component)) {
            (Some(s), Some(mean)) => mean / s.rate,
            (Some(_), None) => self.average(),
            (None, _) => 0.0,
        }
    }
}

/// The full set of variables one experiment samples from.
#[derive(Debug, Clone, Default)]
pub struct TrafficModel {
    pub flow_arrive: FlowArriveVariable,
    pub num_pages: NumPagesVariable,
    pub objs_per_page: ObjsPerPageVariable,
    pub single_obj: SingleObjVariable,
    pub persist_rsp_size: PersistRspSizeVariable,
    pub non_persist_rsp_size: NonPersistRspSizeVariable,
    pub req_size: ReqSizeVariable,
    pub time_btwn_pages: TimeBtwnPagesVariable,
    pub time_btwn_objs: TimeBtwnObjsVariable,
    pub server_delay: ServerDelayVariable,
    pub persistent: PersistentVariable,
}

impl TrafficModel {
    pub fn calibrated(rate: f64) -> Result<Self, ConfigError> {
        Ok(Self {
            flow_arrive: FlowArriveVariable::new(rate)?,
            num_pages: NumPagesVariable::calibrated()?,
            objs_per_page: ObjsPerPageVariable::calibrated()?,
            single_obj: SingleObjVariable::calibrated()?,
            persist_rsp_size: PersistRspSizeVariable::calibrated()?,
            non_persist_rsp_size: NonPersistRspSizeVariable::calibrated()?,
            req_size: ReqSizeVariable::calibrated()?,
            time_btwn_pages: TimeBtwnPagesVariable::calibrated()?,
            time_btwn_objs: TimeBtwnObjsVariable::calibrated()?,
            server_delay: ServerDelayVariable::calibrated()?,
            persistent: PersistentVariable::calibrated()?,
        })
    }

    pub fn variable(&self, kind: VariableKind) -> &dyn HttpRandomVariable {
        match kind {
            VariableKind::FlowArrive => &self.flow_arrive,
            VariableKind::NumPages => &self.num_pages,
            VariableKind::ObjsPerPage => &self.objs_per_page,
            VariableKind::SingleObj => &self.single_obj,
            VariableKind::PersistRspSize => &self.persist_rsp_size,
            VariableKind::NonPersistRspSize => &self.non_persist_rsp_size,
            VariableKind::ReqSize => &self.req_size,
            VariableKind::TimeBtwnPages => &self.time_btwn_pages,
            VariableKind::TimeBtwnObjs => &self.time_btwn_objs,
            VariableKind::ServerDelay => &self.server_delay,
            VariableKind::Persistent => &self.persistent,
        }
    }
}
