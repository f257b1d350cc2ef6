pub mod check;
pub mod env;
pub mod infer;
pub mod resolve;
pub mod types;

use crate::diagnostics::Diagnostics;
use crate::parser::ast::*;
use check::Checker;
use env::{FuncSig, TypeEnv};
use resolve::resolve_type;
use types::Type;

/// Resolve and type-check every function, normalizing each select into a
/// `Stmt::CheckedSelect`. Problems are reported to `diags`; checking always
/// runs to completion.
pub fn type_check(program: &mut Program, diags: &mut Diagnostics) {
    let mut env = TypeEnv::new();

    // Pass 1: register signatures
    let mut param_types = Vec::with_capacity(program.functions.len());
    for func in &program.functions {
        let f = &func.node;
        let params: Vec<Type> = f.params.iter().map(|p| resolve_type(&p.ty, diags)).collect();
        if env.functions.contains_key(&f.name.node) {
            diags.type_error(f.name.span, format!("{} redeclared in this block", f.name.node));
        } else {
            env.functions.insert(f.name.node.clone(), FuncSig { params: params.clone() });
        }
        param_types.push(params);
    }

    // Pass 2: bodies
    let mut checker = Checker::new(env, diags);
    for (func, params) in program.functions.iter_mut().zip(param_types) {
        checker.check_function(&mut func.node, params);
    }
}

/// Type of an already-checked expression.
pub fn type_of(expr: &Expr, locals: &Locals) -> Type {
    match expr {
        Expr::IntLit(_) => Type::Int,
        Expr::BoolLit(_) => Type::Bool,
        Expr::Nil => Type::Nil,
        Expr::Ident(ident) => ident.var.map(|v| locals.ty(v)).unwrap_or(Type::Invalid),
        Expr::Blank => Type::Invalid,
        Expr::Call { .. } => Type::Int,
        Expr::Recv(operand) => type_of(&operand.node, locals)
            .chan_elem()
            .map(|(_, elem)| elem.clone())
            .unwrap_or(Type::Invalid),
        Expr::Unary { op: UnaryOp::Not, .. } => Type::Bool,
        Expr::Unary { op: UnaryOp::Neg, .. } => Type::Int,
        Expr::Binary { op: BinOp::Add | BinOp::Sub, .. } => Type::Int,
        Expr::Binary { .. } => Type::Bool,
        Expr::Conv { to, .. } | Expr::ConvNop { to, .. } => to.clone(),
        Expr::AddrOf(inner) => Type::ptr(type_of(&inner.node, locals)),
        Expr::Index { base, .. } => match type_of(&base.node, locals) {
            Type::Array(elem, _) => *elem,
            _ => Type::Invalid,
        },
        Expr::Field { base, field } => match type_of(&base.node, locals) {
            Type::Struct(st) => st.field(field).map(|f| f.ty.clone()).unwrap_or(Type::Invalid),
            _ => Type::Invalid,
        },
        Expr::Runtime { func, .. } => match func {
            RuntimeFn::SelectGo => Type::Int,
            RuntimeFn::SelectNbSend | RuntimeFn::SelectNbRecv | RuntimeFn::SelectNbRecv2 => Type::Bool,
            RuntimeFn::Block | RuntimeFn::SelectSetPc => Type::Invalid,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticKind;
    use crate::lexer::lex;
    use crate::parser::Parser;
    use crate::span::Spanned;

    fn check(src: &str) -> (Program, Diagnostics) {
        let tokens = lex(src).unwrap();
        let mut program = Parser::new(&tokens, src).parse_program().unwrap();
        let mut diags = Diagnostics::new(src);
        type_check(&mut program, &mut diags);
        (program, diags)
    }

    fn messages(diags: &Diagnostics) -> Vec<String> {
        diags.iter().map(|d| d.msg.clone()).collect()
    }

    #[test]
    fn well_typed_program_has_no_diagnostics() {
        let (program, diags) = check(
            "func main(c chan int, done chan bool) {\n    x := <-c\n    var y int = x + 1\n    c <- y\n    v, ok := <-c\n    if ok && v > 0 {\n        done <- true\n    }\n}",
        );
        assert!(diags.is_empty(), "{:?}", messages(&diags));
        let f = &program.functions[0].node;
        assert!(matches!(f.body[3].node, Stmt::AssignRecv2 { define: true, .. }));
        assert_eq!(f.locals.len(), 6);
    }

    #[test]
    fn undefined_name() {
        let (_, diags) = check("func main() {\n    f(x)\n}");
        assert_eq!(messages(&diags), vec!["undefined: x"]);
    }

    #[test]
    fn receive_from_send_only_channel() {
        let (_, diags) = check("func main(c chan<- int) {\n    <-c\n}");
        assert_eq!(diags.len(), 1);
        assert!(messages(&diags)[0].contains("send-only"));
    }

    #[test]
    fn send_on_receive_only_channel() {
        let (_, diags) = check("func main(c <-chan int) {\n    c <- 1\n}");
        assert!(messages(&diags)[0].contains("receive-only"));
    }

    #[test]
    fn assignment_to_any_inserts_implicit_conversion() {
        let (program, diags) = check("func main(c chan int) {\n    var a any\n    a = <-c\n}");
        assert!(diags.is_empty());
        match &program.functions[0].node.body[1].node {
            Stmt::Assign { rhs, .. } => {
                assert!(matches!(rhs[0].node, Expr::Conv { implicit: true, to: Type::Any, .. }))
            }
            other => panic!("expected assign, got {other:?}"),
        }
    }

    #[test]
    fn explicit_conversion_call() {
        let (program, diags) = check("func main(n int) {\n    var a any = any(n)\n}");
        assert!(diags.is_empty());
        match &program.functions[0].node.body[0].node {
            Stmt::Var { value: Some(value), .. } => {
                assert!(matches!(value.node, Expr::Conv { implicit: false, .. }))
            }
            other => panic!("expected var, got {other:?}"),
        }
    }

    #[test]
    fn define_requires_new_variable() {
        let (_, diags) = check("func main(c chan int) {\n    x := 1\n    x := <-c\n}");
        assert_eq!(messages(&diags), vec!["no new variables on left side of :="]);
    }

    #[test]
    fn break_outside_loop() {
        let (_, diags) = check("func main() {\n    break\n}");
        assert_eq!(messages(&diags), vec!["break is not in a loop or select"]);
    }

    #[test]
    fn break_inside_select_case() {
        let (_, diags) = check("func main(c chan int) {\n    select {\n    case <-c:\n        break\n    }\n}");
        assert!(diags.is_empty());
    }

    #[test]
    fn unused_expression() {
        let (_, diags) = check("func main(n int) {\n    n + 1\n}");
        assert_eq!(messages(&diags), vec!["n + 1 is not used"]);
    }

    #[test]
    fn user_function_arity() {
        let (_, diags) = check("func f(a int) {\n}\nfunc main() {\n    f(1, 2)\n}");
        assert_eq!(messages(&diags), vec!["too many arguments in call to f"]);
    }

    #[test]
    fn blank_is_not_a_value() {
        let (_, diags) = check("func main() {\n    x := _\n}");
        assert!(messages(&diags).contains(&"cannot use _ as value".to_string()));
    }

    #[test]
    fn select_diagnostics_are_collected_with_type_errors() {
        let (_, diags) = check(
            "func main(c chan int) {\n    select {\n    default:\n    default:\n        g(y)\n    }\n}",
        );
        assert_eq!(diags.of_kind(DiagnosticKind::MultipleDefaults).count(), 1);
        assert_eq!(diags.of_kind(DiagnosticKind::Type).count(), 1);
    }

    #[test]
    fn type_of_compiler_forms() {
        let mut locals = Locals::default();
        let order = locals.temp("order", Type::array(Type::Uint16, 4));
        let base = Spanned::dummy(Expr::local("%order", order));
        let first = Expr::Index { base: Box::new(base), index: 0 };
        assert_eq!(type_of(&first, &locals), Type::Uint16);
        let addr = Expr::AddrOf(Box::new(Spanned::dummy(first)));
        assert_eq!(type_of(&addr, &locals), Type::ptr(Type::Uint16));
    }
}
