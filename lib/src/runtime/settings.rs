/// Runtime configuration
///
/// The defaults are suitable for running small programs and tests.
#[derive(Clone, Debug)]
pub struct Settings {
    /// Number of instructions a thread runs before the scheduler moves on to the next thread
    pub quantum: usize,

    /// Maximum number of frames on a call stack
    ///
    /// Pushing a frame beyond this throws `java/lang/StackOverflowError` into the thread instead.
    pub max_call_depth: usize,

    /// Maximum length of a single array
    ///
    /// Creating a longer array throws `java/lang/OutOfMemoryError`. For `multianewarray` this also
    /// bounds the number of elements across all the allocated dimensions.
    pub max_array_length: usize,

    /// Name of the thread created by `Runtime::run_main`
    pub main_thread_name: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            quantum: 1000,
            max_call_depth: 1024,
            max_array_length: 1 << 24,
            main_thread_name: String::from("main"),
        }
    }
}
