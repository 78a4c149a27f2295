// Token and tenant authentication gate for DogRS.

pub mod credentials;
pub mod directory;
pub mod gate;
pub mod jwt;
pub mod options;
pub mod resolver;

pub use credentials::*;
pub use directory::*;
pub use gate::*;
pub use jwt::*;
pub use options::*;
pub use resolver::*;
