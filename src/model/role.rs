use strum_macros::{AsRefStr, Display, EnumString};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Role {
    Admin = 1,
    Hr = 2,
    Employee = 3,
    Instructor = 4,
}

impl Role {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Role::Admin),
            2 => Some(Role::Hr),
            3 => Some(Role::Employee),
            4 => Some(Role::Instructor),
            _ => None,
        }
    }

    pub fn id(self) -> u8 {
        self as u8
    }

    /// Admin and HR use the admin shell.
    pub fn is_staff(self) -> bool {
        matches!(self, Role::Admin | Role::Hr)
    }
}

#[cfg(test)]
mod tests {
    use super::Role;

    #[test]
    fn ids_and_names_agree() {
        for role in [Role::Admin, Role::Hr, Role::Employee, Role::Instructor] {
            assert_eq!(Role::from_id(role.id()), Some(role));
            assert_eq!(role.to_string().parse::<Role>(), Ok(role));
        }
        assert_eq!(Role::from_id(9), None);
        assert!(Role::Hr.is_staff());
        assert!(!Role::Instructor.is_staff());
    }

    #[test]
    fn names_parse_in_any_case() {
        assert_eq!("Instructor".parse::<Role>(), Ok(Role::Instructor));
        assert_eq!("HR".parse::<Role>(), Ok(Role::Hr));
        assert_eq!(Role::Employee.as_ref(), "employee");
        assert!("manager".parse::<Role>().is_err());
    }
}
