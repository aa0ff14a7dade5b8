use crate::domain::ResponseError;
use std::fmt::{Display, Formatter};

/// Tensor component of the linear response, as coded in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpticalDirection {
    Xx,
    Yy,
    Zz,
    Xy,
    Xz,
    Yz,
}

impl OpticalDirection {
    pub const ALL: [Self; 6] = [Self::Xx, Self::Yy, Self::Zz, Self::Xy, Self::Xz, Self::Yz];

    pub fn from_code(code: i64) -> Result<Self, ResponseError> {
        usize::try_from(code)
            .ok()
            .and_then(|index| Self::ALL.get(index).copied())
            .ok_or_else(|| {
                ResponseError::configuration(
                    "CONFIG.DIRECTION",
                    format!("optical direction code {code} is not one of 0..=5"),
                )
            })
    }

    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Xx => "xx",
            Self::Yy => "yy",
            Self::Zz => "zz",
            Self::Xy => "xy",
            Self::Xz => "xz",
            Self::Yz => "yz",
        }
    }
}

impl Display for OpticalDirection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Tensor component of the second-order response. Only in-plane components
/// are produced upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NonlinearDirection {
    Xxx,
    Xxy,
    Xyx,
    Xyy,
    Yxx,
    Yxy,
    Yyx,
    Yyy,
}

impl NonlinearDirection {
    pub const ALL: [Self; 8] = [
        Self::Xxx,
        Self::Xxy,
        Self::Xyx,
        Self::Xyy,
        Self::Yxx,
        Self::Yxy,
        Self::Yyx,
        Self::Yyy,
    ];

    pub fn from_code(code: i64) -> Result<Self, ResponseError> {
        usize::try_from(code)
            .ok()
            .and_then(|index| Self::ALL.get(index).copied())
            .ok_or_else(|| {
                ResponseError::configuration(
                    "CONFIG.DIRECTION",
                    format!("nonlinear direction code {code} is not one of 0..=7"),
                )
            })
    }

    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Xxx => "xxx",
            Self::Xxy => "xxy",
            Self::Xyx => "xyx",
            Self::Xyy => "xyy",
            Self::Yxx => "yxx",
            Self::Yxy => "yxy",
            Self::Yyx => "yyx",
            Self::Yyy => "yyy",
        }
    }
}

impl Display for NonlinearDirection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.suffix())
    }
}

#[cfg(test)]
mod tests {
    use super::{NonlinearDirection, OpticalDirection};
    use crate::domain::ResponseErrorCategory;

    #[test]
    fn optical_codes_follow_store_convention() {
        let suffixes: Vec<&str> = (0..6)
            .map(|code| OpticalDirection::from_code(code).expect("known code").suffix())
            .collect();
        assert_eq!(suffixes, vec!["xx", "yy", "zz", "xy", "xz", "yz"]);
    }

    #[test]
    fn nonlinear_codes_enumerate_in_plane_components() {
        assert_eq!(NonlinearDirection::from_code(0).expect("xxx").suffix(), "xxx");
        assert_eq!(NonlinearDirection::from_code(5).expect("yxy").suffix(), "yxy");
        assert_eq!(NonlinearDirection::from_code(7).expect("yyy").to_string(), "yyy");
    }

    #[test]
    fn unknown_codes_are_configuration_errors() {
        for code in [-1, 6, 42] {
            let error = OpticalDirection::from_code(code).expect_err("unknown optical code");
            assert_eq!(error.category(), ResponseErrorCategory::ConfigurationError);
            assert_eq!(error.placeholder(), "CONFIG.DIRECTION");
        }
        assert!(NonlinearDirection::from_code(8).is_err());
    }
}
