//! The sample programs shipped with the runner.
use strum::{Display, EnumIter, EnumString};

pub const GENERIC_CONSTRUCTS: &str = include_str!("../fixtures/generic_constructs.py");

pub const CONTROL_FLOW: &str = include_str!("../fixtures/control_flow.py");

#[derive(Copy, Clone, Debug, Eq, PartialEq, Display, EnumIter, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum Fixture {
    GenericConstructs,
    ControlFlow,
}

impl Fixture {
    pub fn source(self) -> &'static str {
        match self {
            Self::GenericConstructs => GENERIC_CONSTRUCTS,
            Self::ControlFlow => CONTROL_FLOW,
        }
    }

    pub fn file_name(self) -> String {
        format!("{}.py", self.to_string().replace('-', "_"))
    }
}
