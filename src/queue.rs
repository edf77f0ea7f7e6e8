use std::collections::VecDeque;

use tokio::sync::{Mutex, Notify, oneshot};

use crate::judge::SubmissionRecord;

/// A judging job handed from the web layer to a worker
pub enum JudgeMessage {
    FireAndForget {
        submission_id: i64,
    },
    Blocking {
        submission_id: i64,
        responder: oneshot::Sender<SubmissionRecord>,
    },
}

impl JudgeMessage {
    pub fn id(&self) -> i64 {
        match self {
            Self::FireAndForget { submission_id } => *submission_id,
            Self::Blocking { submission_id, .. } => *submission_id,
        }
    }
}

pub struct JobQueue {
    queue: Mutex<VecDeque<JudgeMessage>>,
    notify: Notify,
}

impl JobQueue {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    pub async fn push(&self, job: JudgeMessage) {
        self.queue.lock().await.push_back(job);
        self.notify.notify_one();
    }

    pub async fn pop(&self) -> JudgeMessage {
        loop {
            if let Some(job) = self.queue.lock().await.pop_front() {
                return job;
            }
            self.notify.notified().await;
        }
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_jobs_come_out_in_push_order() {
        let queue = JobQueue::new();
        queue.push(JudgeMessage::FireAndForget { submission_id: 1 }).await;
        queue.push(JudgeMessage::FireAndForget { submission_id: 2 }).await;

        assert_eq!(queue.pop().await.id(), 1);
        assert_eq!(queue.pop().await.id(), 2);
    }

    #[tokio::test]
    async fn test_pop_wakes_up_on_push() {
        use std::sync::Arc;

        let queue = Arc::new(JobQueue::new());
        let popper = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.pop().await.id() })
        };

        tokio::task::yield_now().await;
        queue.push(JudgeMessage::FireAndForget { submission_id: 7 }).await;

        assert_eq!(popper.await.unwrap(), 7);
    }
}
