use strum_macros::Display;

/// How the debug target came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum TargetKind {
    /// Program started by the debugger.
    Process,
    /// Already running process the debugger attached to.
    Attach,
    /// Post-mortem core file.
    Core,
}

/// Operations a target supports. Checked locally before any command is posted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetConfiguration {
    pub terminate: bool,
    pub disconnect: bool,
    pub restart: bool,
    pub suspend: bool,
    pub resume: bool,
    pub step: bool,
    pub instruction_step: bool,
    pub breakpoints: bool,
    pub registers: bool,
    pub register_modification: bool,
    pub memory_retrieval: bool,
    pub memory_modification: bool,
    pub expression_evaluation: bool,
    pub shared_libraries: bool,
}

impl TargetConfiguration {
    pub fn for_kind(kind: TargetKind) -> Self {
        let live = kind != TargetKind::Core;
        Self {
            terminate: true,
            disconnect: kind == TargetKind::Attach,
            restart: kind == TargetKind::Process,
            suspend: live,
            resume: live,
            step: live,
            instruction_step: live,
            breakpoints: live,
            registers: true,
            register_modification: live,
            memory_retrieval: true,
            memory_modification: live,
            expression_evaluation: true,
            shared_libraries: true,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_capabilities_by_kind() {
        let process = TargetConfiguration::for_kind(TargetKind::Process);
        assert!(process.restart && !process.disconnect && process.memory_modification);

        let attach = TargetConfiguration::for_kind(TargetKind::Attach);
        assert!(!attach.restart && attach.disconnect && attach.resume);

        let core = TargetConfiguration::for_kind(TargetKind::Core);
        assert!(!core.resume && !core.step && !core.memory_modification);
        assert!(core.registers && core.memory_retrieval && core.terminate);
    }
}
