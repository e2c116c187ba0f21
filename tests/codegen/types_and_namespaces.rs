// Named types, aliases, namespaces and scope rules.

use crate::common::{assert_ir, compile_err};

#[test]
fn named_types_keep_their_underlying_codegen() {
    assert_ir(
        r#"
        type Foo I32
        type Bar U64
        type Baz [I8]
        pub fn main() I32 {
            var foo Foo
            _ = foo / foo

            var bar Bar
            _ = bar / bar

            var baz Baz
            _ = [baz + 3]

            return 0
        }
        "#,
        r#"
        export function w $main() {
        @start
            %t1 =l alloc4 4
            storew 0, %t1
            %t2 =w loadw %t1
            %t3 =w loadw %t1
            %t4 =w div %t2, %t3

            %t5 =l alloc8 8
            storel 0, %t5
            %t6 =l loadl %t5
            %t7 =l loadl %t5
            %t8 =l udiv %t6, %t7

            %t9 =l alloc8 8
            storel 0, %t9
            %t10 =l loadl %t9
            %t11 =l add %t10, 3
            %t12 =w loadsb %t11

            ret 0
        }
        "#,
    );
}

#[test]
fn aliases_are_fully_transparent() {
    assert_ir(
        r#"
        type Foo = I32
        pub fn main() I32 {
            var foo Foo
            var bar I32
            _ = foo / bar

            return 0
        }
        "#,
        r#"
        export function w $main() {
        @start
            %t1 =l alloc4 4
            storew 0, %t1
            %t2 =l alloc4 4
            storew 0, %t2
            %t3 =w loadw %t1
            %t4 =w loadw %t2
            %t5 =w div %t3, %t4

            ret 0
        }
        "#,
    );
}

#[test]
fn namespaces_qualify_functions_types_and_lookup() {
    assert_ir(
        r#"
        ns foo {
            type Bar I8
            fn bar(x Bar) {}
        }
        fn bar() {
            var x foo.Bar
            foo.bar(x)
        }
        "#,
        r#"
        function $foo.bar(w %t1) {
        @start
            %t2 =l alloc4 1
            storeb %t1, %t2
            ret
        }
        function $bar() {
        @start
            %t1 =l alloc4 1
            storeb 0, %t1
            %t2 =w loadsb %t1
            call $foo.bar(w %t2)
            ret
        }
        "#,
    );
}

#[test]
fn nested_namespaces_resolve_from_the_root() {
    assert_ir(
        r#"
        ns a {
            ns b {
                var g I32
                fn f() {}
            }
        }
        fn main2() {
            a.b.f()
            a.b.g = 1
        }
        "#,
        r#"
        function $a.b.f() {
        @start
            ret
        }
        function $main2() {
        @start
            call $a.b.f()
            storew 1, $a.b.g
            ret
        }
        data $a.b.g = align 4 { z 4 }
        "#,
    );
}

#[test]
fn namespaced_globals_emit_prefixed_data() {
    assert_ir(
        r#"
        extern var foo I32
        var bar I32
        pub fn main() I32 {
            return foo + bar
        }
        "#,
        r#"
        export function w $main() {
        @start
            %t1 =w loadw $foo
            %t2 =w loadw $bar
            %t3 =w add %t1, %t2
            ret %t3
        }
        data $bar = align 4 { z 4 }
        "#,
    );
}

#[test]
fn duplicate_types_and_variables_are_rejected() {
    assert_eq!(
        compile_err("type Foo I32\ntype Foo I64\n"),
        "Type already exists"
    );
    assert_eq!(
        compile_err("var a I32\nvar a I64\n"),
        "Variable already exists"
    );
    assert_eq!(
        compile_err("fn f() {\n\tvar a I32\n\tvar a I64\n}\n"),
        "Variable already exists"
    );
    assert_eq!(
        compile_err("fn f() {}\nvar f I32\n"),
        "Variable already exists"
    );
}

#[test]
fn unknown_names_are_reported() {
    assert_eq!(compile_err("var x Nope\n"), "Unknown type: Nope");
    assert_eq!(
        compile_err("fn f() {\n\tx = 1\n}\n"),
        "Undefined variable: x"
    );
    assert_eq!(
        compile_err("var x nope.T\n"),
        "nope is not a namespace"
    );
}

#[test]
fn named_types_are_nominal_across_namespaces() {
    // Two distinct named wrappers around I32 do not mix.
    let err = compile_err(
        r#"
        type A I32
        type B I32
        fn f() {
            var a A
            var b B
            a = b
        }
        "#,
    );
    assert_eq!(err, "Operands of assignment are incompatible");
}
