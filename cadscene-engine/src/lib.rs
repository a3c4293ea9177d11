pub mod bake;
pub mod block;
pub mod command;
pub mod drawer;
pub mod generator;
pub mod scene;
pub mod session;
pub mod units;

pub mod errors {
    use cadscene_core::document::EntityKind;
    use thiserror::Error;

    #[derive(Debug, Clone, Error, PartialEq, Eq)]
    pub enum DrawError {
        #[error("drawing was cancelled")]
        Cancelled,
        #[error("generator for {expected} received a {actual} entity")]
        KindMismatch {
            expected: EntityKind,
            actual: EntityKind,
        },
        #[error("{0} entity has no geometry")]
        EmptyGeometry(EntityKind),
        #[error("scene node {0} not found")]
        NodeNotFound(usize),
    }
}

pub mod schedule {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// 协作式任务的取消信号，可在宿主帧循环与任务之间共享。
    #[derive(Debug, Clone, Default)]
    pub struct CancelToken(Arc<AtomicBool>);

    impl CancelToken {
        pub fn new() -> Self {
            Self::default()
        }

        #[inline]
        pub fn cancel(&self) {
            self.0.store(true, Ordering::SeqCst);
        }

        #[inline]
        pub fn is_cancelled(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    /// 单次推进后的任务状态。
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Progress {
        Pending,
        Done,
    }

    impl Progress {
        #[inline]
        pub fn is_done(self) -> bool {
            matches!(self, Progress::Done)
        }
    }

}
