pub mod assignments;
pub mod backup;
pub mod core;
pub mod courses;
pub mod enrollments;
pub mod gradebook;
pub mod grades;
pub mod lectures;
pub mod quizzes;
pub mod setup;
pub mod students;
