use folio_page_contract::ContractError;
use std::fmt;

#[derive(Debug)]
pub enum FolioError {
    InvalidConfiguration(String),
    Stylesheet(String),
    Font(String),
    Contract(ContractError),
    Io(std::io::Error),
}

impl fmt::Display for FolioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FolioError::InvalidConfiguration(message) => {
                write!(f, "invalid configuration: {}", message)
            }
            FolioError::Stylesheet(message) => write!(f, "stylesheet error: {}", message),
            FolioError::Font(message) => write!(f, "font error: {}", message),
            FolioError::Contract(err) => write!(f, "page contract error: {}", err),
            FolioError::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for FolioError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FolioError::Contract(err) => Some(err),
            FolioError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for FolioError {
    fn from(value: std::io::Error) -> Self {
        FolioError::Io(value)
    }
}

impl From<ContractError> for FolioError {
    fn from(value: ContractError) -> Self {
        FolioError::Contract(value)
    }
}
