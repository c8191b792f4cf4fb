use clap::ValueEnum;
use visits::reference::ReferenceKind;
use visits::technician::Role;

/// Args decouple of CLI arg handling requirements from the internal data structures

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
#[value(rename_all = "kebab-case")]
pub enum ReferenceKindArg {
    BaitTypes,
    Chemicals,
}

impl From<ReferenceKindArg> for ReferenceKind {
    fn from(value: ReferenceKindArg) -> Self {
        match value {
            ReferenceKindArg::BaitTypes => Self::BaitTypes,
            ReferenceKindArg::Chemicals => Self::Chemicals,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
#[value(rename_all = "lower")]
pub enum RoleArg {
    Technician,
    Admin,
    Customer,
}

impl From<RoleArg> for Role {
    fn from(value: RoleArg) -> Self {
        match value {
            RoleArg::Technician => Self::Technician,
            RoleArg::Admin => Self::Admin,
            RoleArg::Customer => Self::Customer,
        }
    }
}
