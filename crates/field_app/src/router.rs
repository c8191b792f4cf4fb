//! Screen selection as an explicit finite-state router.

use thiserror::Error;
use tracing::debug;
use visits::id::{CustomerId, VisitId};
use visits::technician::Role;

#[derive(serde::Serialize, serde::Deserialize, Default, Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    #[default]
    SignIn,
    TechnicianHome,
    AdminHome,
    CustomerHome,
    Calendar,
    Inspection {
        customer_id: CustomerId,
    },
    StationMapEditor {
        customer_id: CustomerId,
    },
    Report {
        visit_id: VisitId,
    },
}

impl Screen {
    pub fn home(role: Option<Role>) -> Screen {
        match role {
            None => Screen::SignIn,
            Some(Role::Technician) => Screen::TechnicianHome,
            Some(Role::Admin) => Screen::AdminHome,
            Some(Role::Customer) => Screen::CustomerHome,
        }
    }

    pub fn is_permitted(&self, role: Option<Role>) -> bool {
        match (role, self) {
            (None, Screen::SignIn) => true,
            (None, _) => false,
            (Some(_), Screen::SignIn) => false,
            (Some(Role::Customer), Screen::CustomerHome | Screen::Report { .. }) => true,
            (Some(Role::Customer), _) => false,
            (Some(_), Screen::CustomerHome) => false,
            (Some(Role::Technician), Screen::AdminHome) => false,
            (Some(_), _) => true,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouterError {
    #[error("Screen not permitted. screen: {screen:?}, role: {role:?}")]
    NotPermitted { screen: Screen, role: Option<Role> },
    #[error("No previous screen")]
    NoPreviousScreen,
}

#[derive(Default, Debug, Clone, PartialEq)]
pub struct Router {
    current: Screen,
    back_stack: Vec<Screen>,
}

impl Router {
    pub fn current(&self) -> &Screen {
        &self.current
    }

    pub fn navigate(&mut self, screen: Screen, role: Option<Role>) -> Result<(), RouterError> {
        if !screen.is_permitted(role) {
            return Err(RouterError::NotPermitted {
                screen,
                role,
            });
        }
        if screen == self.current {
            return Ok(());
        }

        debug!("Navigating. from: {:?}, to: {:?}", self.current, screen);
        let previous = std::mem::replace(&mut self.current, screen);
        self.back_stack.push(previous);
        Ok(())
    }

    pub fn back(&mut self) -> Result<&Screen, RouterError> {
        let previous = self
            .back_stack
            .pop()
            .ok_or(RouterError::NoPreviousScreen)?;
        debug!("Navigating back. from: {:?}, to: {:?}", self.current, previous);
        self.current = previous;
        Ok(&self.current)
    }

    /// Shows the role's home screen with an empty back stack.
    pub fn reset_for(&mut self, role: Option<Role>) {
        self.current = Screen::home(role);
        self.back_stack.clear();
    }
}
