//! Tests for the filter chain and the try-with-resources recognizer

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;
use crate::insn::{opcodes, InvokeOp};
use std::cell::RefCell;
use std::rc::Rc;

/// Records what a filter asked to undo
#[derive(Debug, Default)]
struct RecordingContext {
    removed_lines: Vec<u32>,
    removed_jumps: Vec<u32>,
}

impl FilterContext for RecordingContext {
    fn remove_line(&mut self, line: u32) {
        self.removed_lines.push(line);
    }

    fn remove_last_jump(&mut self, line: u32) {
        self.removed_jumps.push(line);
    }
}

fn twr_chain() -> FilterChain {
    FilterChain::new().with_filter(Box::new(TryWithResourcesFilter::new()))
}

fn run(chain: &mut FilterChain, insns: &[Insn]) -> RecordingContext {
    let mut context = RecordingContext::default();
    for insn in insns {
        chain.dispatch(insn, &mut context);
    }
    chain.finish(&mut context);
    context
}

fn close() -> Insn {
    Insn::invoke_virtual("com/example/Resource", "close", "()V")
}

fn add_suppressed() -> Insn {
    Insn::invoke_virtual(
        "java/lang/Throwable",
        "addSuppressed",
        "(Ljava/lang/Throwable;)V",
    )
}

/// Null-checked close followed by the suppressed-exception handler
fn cleanup_with_handler() -> Vec<Insn> {
    vec![
        Insn::aload(1),
        Insn::jump(JumpOp::IfNull),
        Insn::aload(1),
        close(),
        Insn::jump(JumpOp::Goto),
        Insn::astore(3),
        Insn::aload(2),
        Insn::aload(3),
        add_suppressed(),
        Insn::aload(2),
        Insn::Plain(opcodes::ATHROW),
    ]
}

// ============================================================================
// Try-with-resources recognizer
// ============================================================================

mod try_with_resources_tests {
    use super::*;

    #[test]
    fn test_full_idiom_retracts_line_and_jump() {
        let mut insns = vec![Insn::LineNumber(10)];
        insns.extend(cleanup_with_handler());
        let context = run(&mut twr_chain(), &insns);
        assert_eq!(context.removed_lines, vec![10]);
        assert_eq!(context.removed_jumps, vec![10]);
    }

    #[test]
    fn test_close_and_goto_alone_retracts() {
        let insns = [
            Insn::LineNumber(10),
            Insn::aload(1),
            close(),
            Insn::jump(JumpOp::Goto),
        ];
        let context = run(&mut twr_chain(), &insns);
        assert_eq!(context.removed_lines, vec![10]);
        assert!(context.removed_jumps.is_empty());
    }

    #[test]
    fn test_interface_close_matches() {
        let insns = [
            Insn::LineNumber(10),
            Insn::aload(1),
            Insn::invoke_interface("java/lang/AutoCloseable", "close", "()V"),
        ];
        let context = run(&mut twr_chain(), &insns);
        assert_eq!(context.removed_lines, vec![10]);
    }

    #[test]
    fn test_java8_secondary_close_retracts() {
        let insns = [
            Insn::LineNumber(10),
            Insn::aload(1),
            close(),
            Insn::jump(JumpOp::Goto),
            Insn::astore(3),
            Insn::aload(2),
            Insn::aload(3),
            add_suppressed(),
            Insn::jump(JumpOp::Goto),
            Insn::aload(1),
            close(),
            Insn::jump(JumpOp::Goto),
        ];
        let context = run(&mut twr_chain(), &insns);
        assert_eq!(context.removed_lines, vec![10]);
    }

    #[test]
    fn test_rethrow_loops_back_to_store() {
        let mut insns = vec![Insn::LineNumber(10)];
        insns.extend(cleanup_with_handler());
        insns.extend([
            Insn::astore(4),
            Insn::aload(1),
            close(),
            Insn::jump(JumpOp::Goto),
        ]);
        let context = run(&mut twr_chain(), &insns);
        assert_eq!(context.removed_lines, vec![10]);
    }

    #[test]
    fn test_field_access_before_terminal_keeps_line_and_jump() {
        let insns = [
            Insn::LineNumber(10),
            Insn::aload(1),
            Insn::jump(JumpOp::IfNull),
            Insn::get_static("java/lang/System", "out"),
            Insn::aload(1),
            close(),
            Insn::jump(JumpOp::Goto),
        ];
        let context = run(&mut twr_chain(), &insns);
        assert!(context.removed_lines.is_empty());
        assert!(context.removed_jumps.is_empty());
    }

    #[test]
    fn test_real_code_after_idiom_keeps_line() {
        let insns = [
            Insn::LineNumber(10),
            Insn::aload(1),
            close(),
            Insn::jump(JumpOp::Goto),
            Insn::Ldc("done".to_string()),
            Insn::aload(1),
            close(),
        ];
        let context = run(&mut twr_chain(), &insns);
        assert!(context.removed_lines.is_empty());
    }

    #[test]
    fn test_primitive_load_is_real_code() {
        let insns = [
            Insn::LineNumber(10),
            Insn::iload(1),
            Insn::aload(1),
            close(),
        ];
        let context = run(&mut twr_chain(), &insns);
        assert!(context.removed_lines.is_empty());
    }

    #[test]
    fn test_non_terminal_state_keeps_line() {
        let insns = [
            Insn::LineNumber(10),
            Insn::aload(1),
            Insn::jump(JumpOp::IfNull),
        ];
        let context = run(&mut twr_chain(), &insns);
        assert!(context.removed_lines.is_empty());
    }

    #[test]
    fn test_close_with_arguments_is_real_code() {
        let insns = [
            Insn::LineNumber(10),
            Insn::aload(1),
            Insn::invoke_virtual("com/example/Channel", "close", "(Z)V"),
        ];
        let context = run(&mut twr_chain(), &insns);
        assert!(context.removed_lines.is_empty());
    }

    #[test]
    fn test_add_suppressed_on_other_owner_is_real_code() {
        let insns = [
            Insn::LineNumber(10),
            Insn::aload(1),
            close(),
            Insn::jump(JumpOp::Goto),
            Insn::astore(3),
            Insn::aload(2),
            Insn::aload(3),
            Insn::invoke_virtual(
                "com/example/MyError",
                "addSuppressed",
                "(Ljava/lang/Throwable;)V",
            ),
        ];
        let context = run(&mut twr_chain(), &insns);
        assert!(context.removed_lines.is_empty());
    }

    #[test]
    fn test_decision_is_per_line() {
        let insns = [
            Insn::LineNumber(10),
            Insn::aload(1),
            close(),
            Insn::LineNumber(11),
            Insn::aload(1),
            Insn::invoke_virtual("com/example/Resource", "read", "()I"),
            Insn::LineNumber(12),
            Insn::aload(1),
            close(),
            Insn::jump(JumpOp::Goto),
        ];
        let context = run(&mut twr_chain(), &insns);
        assert_eq!(context.removed_lines, vec![10, 12]);
    }

    #[test]
    fn test_every_pending_null_check_is_discharged() {
        let insns = [
            Insn::LineNumber(10),
            Insn::aload(1),
            Insn::jump(JumpOp::IfNull),
            Insn::aload(2),
            Insn::jump(JumpOp::IfNull),
            Insn::aload(1),
            close(),
            Insn::jump(JumpOp::Goto),
        ];
        let context = run(&mut twr_chain(), &insns);
        assert_eq!(context.removed_jumps, vec![10, 10]);
        assert_eq!(context.removed_lines, vec![10]);
    }

    #[test]
    fn test_nothing_before_first_line() {
        let insns = [Insn::aload(1), close(), Insn::jump(JumpOp::Goto)];
        let context = run(&mut twr_chain(), &insns);
        assert!(context.removed_lines.is_empty());
        assert!(context.removed_jumps.is_empty());
    }

    #[test]
    fn test_retracted_line_not_retracted_twice() {
        let mut filter = TryWithResourcesFilter::new();
        let mut context = RecordingContext::default();
        filter.on_line_boundary(10, &mut context);
        filter.on_var_insn(VarOp::Load, true);
        filter.on_method_insn(&MethodInsn {
            op: InvokeOp::Virtual,
            owner: "com/example/Resource".to_string(),
            name: "close".to_string(),
            descriptor: "()V".to_string(),
            is_interface: false,
        });
        filter.on_method_end(&mut context);
        filter.on_method_end(&mut context);
        assert_eq!(context.removed_lines, vec![10]);
    }

    #[test]
    fn test_applicability_by_class_version() {
        let filter = TryWithResourcesFilter::new();
        let context = MethodContext::new("Foo", "run", "()V");
        assert!(filter.is_applicable(&context));
        assert!(!filter.is_applicable(&context.clone().with_class_version(50)));
        assert!(filter.is_applicable(&context.clone().with_class_version(51)));
        assert!(filter.is_applicable(&context.with_class_version(65)));
    }
}

// ============================================================================
// Chain
// ============================================================================

mod chain_tests {
    use super::*;

    /// Logs every callback as `name:event`
    #[derive(Debug)]
    struct LoggingFilter {
        name: &'static str,
        log: Rc<RefCell<Vec<String>>>,
        min_version: u16,
    }

    impl LoggingFilter {
        fn boxed(name: &'static str, log: &Rc<RefCell<Vec<String>>>) -> Box<Self> {
            Box::new(Self {
                name,
                log: Rc::clone(log),
                min_version: 0,
            })
        }

        fn record(&self, event: &str) {
            self.log.borrow_mut().push(format!("{}:{}", self.name, event));
        }
    }

    impl LineFilter for LoggingFilter {
        fn name(&self) -> &'static str {
            self.name
        }

        fn is_applicable(&self, context: &MethodContext) -> bool {
            context.class_version >= self.min_version
        }

        fn on_line_boundary(&mut self, line: u32, _context: &mut dyn FilterContext) {
            self.record(&format!("line{line}"));
        }

        fn on_method_end(&mut self, _context: &mut dyn FilterContext) {
            self.record("end");
        }

        fn on_jump_insn(&mut self, _op: JumpOp, _context: &mut dyn FilterContext) {
            self.record("jump");
        }

        fn on_other_insn(&mut self, _insn: &Insn) {
            self.record("other");
        }
    }

    #[test]
    fn test_dispatch_in_chain_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut chain = FilterChain::new()
            .with_filter(LoggingFilter::boxed("a", &log))
            .with_filter(LoggingFilter::boxed("b", &log));
        let _ = run(
            &mut chain,
            &[
                Insn::LineNumber(3),
                Insn::jump(JumpOp::IfEq),
                Insn::TableSwitch { min: 0, max: 2 },
            ],
        );
        assert_eq!(
            *log.borrow(),
            vec![
                "a:line3", "b:line3", "a:jump", "b:jump", "a:other", "b:other", "a:end", "b:end",
            ]
        );
    }

    #[test]
    fn test_default_callbacks_ignore_events() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut chain = FilterChain::new().with_filter(LoggingFilter::boxed("a", &log));
        let _ = run(
            &mut chain,
            &[Insn::aload(0), Insn::Plain(opcodes::RETURN), close()],
        );
        assert_eq!(*log.borrow(), vec!["a:end"]);
    }

    #[test]
    fn test_retain_applicable_drops_filters() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut late = LoggingFilter::boxed("late", &log);
        late.min_version = 61;
        let chain = FilterChain::new()
            .with_filter(LoggingFilter::boxed("early", &log))
            .with_filter(late)
            .retain_applicable(&MethodContext::new("Foo", "run", "()V").with_class_version(52));
        assert_eq!(chain.names(), vec!["early"]);
    }

    #[test]
    fn test_from_config() {
        let chain = FilterChain::from_config(&FilterConfig::default());
        assert_eq!(chain.names(), vec!["try-with-resources"]);
        assert!(FilterChain::from_config(&FilterConfig::none()).is_empty());
    }

    #[test]
    fn test_class_data_as_context() {
        let mut class = ClassData::new("Foo");
        let line = class.get_or_create_line(10, "run()V");
        line.add_jump(0);
        line.add_jump(1);

        let context: &mut dyn FilterContext = &mut class;
        context.remove_last_jump(10);
        context.remove_last_jump(99);
        context.remove_line(99);
        assert_eq!(class.line(10).unwrap().jumps().len(), 1);

        let context: &mut dyn FilterContext = &mut class;
        context.remove_line(10);
        assert!(!class.contains_line(10));
    }

    #[test]
    fn test_method_signature() {
        let context = MethodContext::new("Foo", "run", "(I)V");
        assert_eq!(context.signature(), "run(I)V");
        assert_eq!(context.class_version, 0);
    }
}
