pub mod ms {
    pub const POLL_INTERVAL: u64 = 100;
    pub const PAGE_LOAD_SETTLE: u64 = 300;
    pub const CONNECT_RETRY: u64 = 500;
    pub const ELEMENT_WAIT: u64 = 30_000;
    pub const PRECONDITION_WAIT: u64 = 30_000;
    pub const RESTORE_WAIT: u64 = 30_000;
    pub const STATUS_PROBE: u64 = 3_000;
    pub const DIALOG_PROBE: u64 = 1_000;
    pub const TYPE_DELAY: u64 = 50;
    pub const CLICK_DELAY: u64 = 100;
}

pub mod secs {
    pub const READY_STATE: u64 = 5;
    pub const NAVIGATION: u64 = 30;
    pub const REQUEST: u64 = 120;
}
