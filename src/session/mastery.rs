//! Session-scoped mastery tracking
//!
//! The tracker walks a working order of item positions. In
//! repeat-until-mastered mode a missed item is appended to the end of the
//! order and the session only ends once every distinct word has been answered
//! correctly. Otherwise each item is shown exactly once.

use std::collections::HashSet;

use crate::storage::Outcome;

#[derive(Debug, Clone)]
pub struct MasteryTracker {
    /// Word id of each item position
    word_ids: Vec<i64>,
    order: Vec<usize>,
    cursor: usize,
    remaining: HashSet<i64>,
    unique_total: usize,
    processed: usize,
    correct: usize,
    repeat_until_mastered: bool,
    finished: bool,
}

impl MasteryTracker {
    pub fn new(word_ids: Vec<i64>, repeat_until_mastered: bool) -> Self {
        let remaining: HashSet<i64> = word_ids.iter().copied().collect();
        let order = (0..word_ids.len()).collect();
        Self {
            unique_total: remaining.len(),
            finished: word_ids.is_empty(),
            word_ids,
            order,
            cursor: 0,
            remaining,
            processed: 0,
            correct: 0,
            repeat_until_mastered,
        }
    }

    /// Item position to show next, `None` once finished
    pub fn current(&self) -> Option<usize> {
        if self.finished {
            return None;
        }
        self.order.get(self.cursor).copied()
    }

    /// Apply an answer to the current item and advance
    pub fn record(&mut self, outcome: Outcome) {
        let Some(position) = self.current() else {
            return;
        };
        let word_id = self.word_ids[position];
        self.processed += 1;

        if outcome.is_correct() {
            self.correct += 1;
            self.remaining.remove(&word_id);
        } else if self.repeat_until_mastered {
            self.order.push(position);
        }

        self.cursor += 1;
        if self.repeat_until_mastered {
            while let Some(&next) = self.order.get(self.cursor) {
                if self.remaining.contains(&self.word_ids[next]) {
                    break;
                }
                self.cursor += 1;
            }
        }

        self.finished = self.cursor >= self.order.len() || (self.repeat_until_mastered && self.remaining.is_empty());
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn mastered_count(&self) -> usize {
        self.unique_total - self.remaining.len()
    }

    pub fn unique_total(&self) -> usize {
        self.unique_total
    }

    /// Answers recorded, repeats included
    pub fn processed(&self) -> usize {
        self.processed
    }

    pub fn correct(&self) -> usize {
        self.correct
    }

    /// Length of the working order, including requeued repeats
    pub fn planned(&self) -> usize {
        self.order.len()
    }
}
