pub mod codec;
pub mod controller;
pub mod detector;
pub mod qr;
pub mod session;
pub mod store;

pub use codec::CredentialCodec;
pub use controller::{AuthState, AuthenticationController, ClientEvent, EventStream, FailureReason};
pub use detector::{ArmedDetector, AuthSignalDetector};
pub use qr::{QrCodeWatcher, QrFrame};
pub use session::{CookieRecord, Session};
pub use store::CredentialStore;
