pub mod linkedin;
pub mod util;

pub use linkedin::LinkedInPublisher;
