//! Context rules for `break`, `continue`, `return`, `yield` and `await`.
//!
//! The parser keeps one [`Frame`] per function, lambda, class and module body
//! and asks it whether a flow construct is legal where it appears.

use crate::grammar::Grammar;
use crate::location::Position;
use crate::types::Diagnostic;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Module,
    Class,
    Function,
    Lambda,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowBlock {
    Loop,
    Finally,
}

#[derive(Debug, Clone)]
pub struct Frame {
    pub kind: FrameKind,
    pub is_async: bool,
    /// Lexically inside an `async def`, however deeply nested.
    pub async_region: bool,
    blocks: Vec<FlowBlock>,
    yield_at: Option<Position>,
    return_value_at: Option<Position>,
}

impl Frame {
    pub fn module() -> Self {
        Self {
            kind: FrameKind::Module,
            is_async: false,
            async_region: false,
            blocks: Vec::new(),
            yield_at: None,
            return_value_at: None,
        }
    }

    /// A frame for a body nested inside this one.
    pub fn nested(&self, kind: FrameKind, is_async: bool) -> Self {
        Self {
            kind,
            is_async,
            async_region: self.async_region || is_async,
            ..Self::module()
        }
    }

    pub fn enter_block(&mut self, block: FlowBlock) {
        self.blocks.push(block);
    }

    pub fn exit_block(&mut self) {
        self.blocks.pop();
    }

    fn in_function(&self) -> bool {
        matches!(self.kind, FrameKind::Function | FrameKind::Lambda)
    }

    fn in_async_function(&self) -> bool {
        self.kind == FrameKind::Function && self.is_async
    }

    pub fn check_break(&self, at: Position) -> Option<Diagnostic> {
        (!self.blocks.contains(&FlowBlock::Loop))
            .then(|| Diagnostic::syntax(at, "'break' outside loop"))
    }

    pub fn check_continue(&self, at: Position, grammar: &Grammar) -> Option<Diagnostic> {
        for block in self.blocks.iter().rev() {
            match block {
                FlowBlock::Loop => return None,
                FlowBlock::Finally if grammar.features.continue_in_finally_rejected => {
                    return Some(Diagnostic::syntax(
                        at,
                        "'continue' not supported inside 'finally' clause",
                    ));
                }
                FlowBlock::Finally => {}
            }
        }
        Some(Diagnostic::syntax(at, "'continue' not properly in loop"))
    }

    pub fn check_return(&mut self, at: Position, has_value: bool) -> Option<Diagnostic> {
        if !self.in_function() {
            return Some(Diagnostic::syntax(at, "'return' outside function"));
        }
        if has_value && self.return_value_at.is_none() {
            self.return_value_at = Some(at);
        }
        None
    }

    pub fn check_yield(&mut self, at: Position, is_from: bool, grammar: &Grammar) -> Option<Diagnostic> {
        if !self.in_function() {
            return Some(Diagnostic::syntax(at, "'yield' outside function"));
        }
        if self.in_async_function() {
            if is_from {
                return Some(Diagnostic::syntax(at, "'yield from' inside async function"));
            }
            if !grammar.features.async_generators {
                return Some(Diagnostic::syntax(at, "'yield' inside async function"));
            }
        }
        self.yield_at.get_or_insert(at);
        None
    }

    pub fn check_await(&self, at: Position) -> Option<Diagnostic> {
        if !self.in_function() {
            Some(Diagnostic::syntax(at, "'await' outside function"))
        } else if !self.in_async_function() {
            Some(Diagnostic::syntax(at, "'await' outside async function"))
        } else {
            None
        }
    }

    /// `async for` and `async with` statements; `keyword` is `for` or `with`.
    pub fn check_async_statement(&self, at: Position, keyword: &str) -> Option<Diagnostic> {
        (!self.in_async_function()).then(|| {
            Diagnostic::syntax(at, format!("'async {keyword}' outside async function"))
        })
    }

    pub fn check_async_comprehension(
        &self,
        at: Position,
        generator: bool,
        grammar: &Grammar,
    ) -> Option<Diagnostic> {
        if self.in_async_function() || (generator && grammar.features.async_genexp_anywhere) {
            return None;
        }
        Some(Diagnostic::syntax(
            at,
            "asynchronous comprehension outside of an asynchronous function",
        ))
    }

    /// Checks that need the whole body, run when the frame is closed.
    pub fn finish(&self, grammar: &Grammar) -> Option<Diagnostic> {
        let async_generator =
            self.in_async_function() && grammar.features.async_generators && self.yield_at.is_some();
        match self.return_value_at {
            Some(at) if async_generator => {
                Some(Diagnostic::syntax(at, "'return' with value in async generator"))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::load_grammar;

    fn pos(line: usize) -> Position {
        Position::new(line, 0)
    }

    #[test]
    fn test_break_needs_loop() {
        let mut frame = Frame::module();
        assert!(frame.check_break(pos(1)).is_some());
        frame.enter_block(FlowBlock::Loop);
        frame.enter_block(FlowBlock::Finally);
        assert!(frame.check_break(pos(2)).is_none());
    }

    #[test]
    fn test_continue_in_finally() {
        let mut frame = Frame::module();
        frame.enter_block(FlowBlock::Loop);
        frame.enter_block(FlowBlock::Finally);
        assert_eq!(
            frame.check_continue(pos(5), load_grammar("3.7").unwrap()).unwrap().message(),
            "SyntaxError: 'continue' not supported inside 'finally' clause"
        );
        assert!(frame.check_continue(pos(5), load_grammar("3.8").unwrap()).is_none());
        frame.exit_block();
        frame.exit_block();
        assert_eq!(
            frame.check_continue(pos(6), load_grammar("3.8").unwrap()).unwrap().message(),
            "SyntaxError: 'continue' not properly in loop"
        );
    }

    #[test]
    fn test_nested_function_resets_blocks() {
        let mut module = Frame::module();
        module.enter_block(FlowBlock::Loop);
        let inner = module.nested(FrameKind::Function, false);
        assert!(inner.check_break(pos(3)).is_some());
    }

    #[test]
    fn test_return_and_yield_outside_function() {
        let g = load_grammar("3.6").unwrap();
        let mut module = Frame::module();
        assert!(module.check_return(pos(1), false).is_some());
        assert_eq!(
            module.check_yield(pos(1), false, g).unwrap().message(),
            "SyntaxError: 'yield' outside function"
        );
        let mut class = module.nested(FrameKind::Class, false);
        assert!(class.check_return(pos(2), true).is_some());
        let mut lambda = module.nested(FrameKind::Lambda, false);
        assert!(lambda.check_yield(pos(3), false, g).is_none());
    }

    #[test]
    fn test_yield_in_async_function() {
        let module = Frame::module();
        let mut f35 = module.nested(FrameKind::Function, true);
        assert_eq!(
            f35.check_yield(pos(1), false, load_grammar("3.5").unwrap()).unwrap().message(),
            "SyntaxError: 'yield' inside async function"
        );
        let mut f36 = module.nested(FrameKind::Function, true);
        let g36 = load_grammar("3.6").unwrap();
        assert!(f36.check_yield(pos(1), false, g36).is_none());
        assert_eq!(
            f36.check_yield(pos(2), true, g36).unwrap().message(),
            "SyntaxError: 'yield from' inside async function"
        );
    }

    #[test]
    fn test_return_value_in_async_generator() {
        let g = load_grammar("3.6").unwrap();
        let mut f = Frame::module().nested(FrameKind::Function, true);
        assert!(f.check_return(pos(3), true).is_none());
        assert!(f.check_yield(pos(2), false, g).is_none());
        let d = f.finish(g).unwrap();
        assert_eq!(d.message(), "SyntaxError: 'return' with value in async generator");
        assert_eq!(d.start(), pos(3));
    }

    #[test]
    fn test_await_contexts() {
        let module = Frame::module();
        assert_eq!(
            module.check_await(pos(1)).unwrap().message(),
            "SyntaxError: 'await' outside function"
        );
        let outer = module.nested(FrameKind::Function, true);
        assert!(outer.check_await(pos(2)).is_none());
        let inner = outer.nested(FrameKind::Function, false);
        assert!(inner.async_region);
        assert_eq!(
            inner.check_await(pos(3)).unwrap().message(),
            "SyntaxError: 'await' outside async function"
        );
    }

    #[test]
    fn test_async_comprehension() {
        let g36 = load_grammar("3.6").unwrap();
        let g37 = load_grammar("3.7").unwrap();
        let plain = Frame::module().nested(FrameKind::Function, false);
        assert!(plain.check_async_comprehension(pos(1), false, g36).is_some());
        assert!(plain.check_async_comprehension(pos(1), true, g36).is_some());
        assert!(plain.check_async_comprehension(pos(1), true, g37).is_none());
    }
}
