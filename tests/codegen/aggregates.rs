// Struct and union layout, field access, and the composite call/return ABI.

use crate::common::assert_ir;

#[test]
fn struct_layouts_pool_in_the_prelude() {
    assert_ir(
        r#"
        type Foo struct { a, b I32; c I64 }
        type Bar struct { a, b, c I8 }
        type Baz struct { a I8; b I64; c I8 }
        fn fooFn(_ Foo)
        fn barFn(_ Bar)
        fn bazFn(_ Baz)
        pub fn main() I32 {
            var foo Foo
            fooFn(foo)
            var bar Bar
            barFn(bar)
            var baz Baz
            bazFn(baz)
            return 0
        }
        "#,
        r#"
        type :b3 = { b 3 }
        type :blb = { b, l, b }
        type :w2l = { w 2, l }
        export function w $main() {
        @start
            %t1 =l alloc8 16
            storew 0, %t1
            %t2 =l add %t1, 4
            storew 0, %t2
            %t3 =l add %t1, 8
            storel 0, %t3

            call $fooFn(:w2l %t1)

            %t4 =l alloc4 3
            storeb 0, %t4
            %t5 =l add %t4, 1
            storeb 0, %t5
            %t6 =l add %t4, 2
            storeb 0, %t6

            call $barFn(:b3 %t4)

            %t7 =l alloc8 24
            storeb 0, %t7
            %t8 =l add %t7, 8
            storel 0, %t8
            %t9 =l add %t7, 16
            storeb 0, %t9

            call $bazFn(:blb %t7)

            ret 0
        }
        "#,
    );
}

#[test]
fn unions_share_the_abi_of_their_largest_member() {
    assert_ir(
        r#"
        type Foo union { a, b I32; c I64 }
        type Bar union { a, b, c I8 }
        fn fooFn(_ Foo)
        fn barFn(_ Bar)
        pub fn main() I32 {
            var foo Foo
            fooFn(foo)
            var bar Bar
            barFn(bar)
            return 0
        }
        "#,
        r#"
        type :b = { b }
        type :l = { l }
        export function w $main() {
        @start
            %t1 =l alloc8 8
            storel 0, %t1
            call $fooFn(:l %t1)

            %t2 =l alloc4 1
            storeb 0, %t2
            call $barFn(:b %t2)

            ret 0
        }
        "#,
    );
}

#[test]
fn recursive_types_resolve_through_their_slot() {
    assert_ir(
        r#"
        type Foo struct {
            foo [Foo]
        }
        type Bar struct {
            foo [Foo]
            _ U32
        }
        var foo Bar
        fn f(bar Bar) Foo {
            foo.foo = bar.foo
            return bar.foo.foo
        }
        "#,
        r#"
        type :l = { l }
        type :lw = { l, w }
        function :l $f(:lw %t1) {
        @start
            %t2 =l loadl %t1
            storel %t2, $foo

            %t3 =l loadl %t1
            %t4 =l loadl %t3
            ret %t4
        }
        data $foo = align 8 { z 16 }
        "#,
    );
}

#[test]
fn structurally_equal_types_share_one_ir_aggregate() {
    assert_ir(
        r#"
        type S struct { a I32 }
        type U struct { a I32 }
        fn sf() S {
            var s S
            return s
        }
        fn uf() U {
            var u U
            return u
        }
        "#,
        r#"
        type :w = { w }
        function :w $sf() {
        @start
            %t1 =l alloc4 4
            storew 0, %t1
            ret %t1
        }
        function :w $uf() {
        @start
            %t1 =l alloc4 4
            storew 0, %t1
            ret %t1
        }
        "#,
    );
}

#[test]
fn field_access_adds_compile_time_offsets() {
    assert_ir(
        r#"
        type Foo struct { a, b I32; c I64 }
        type Bar union { a, b I32; c I64 }
        fn f() {
            var foo Foo
            _ = foo.a
            _ = foo.b
            _ = foo.c

            var bar Bar
            _ = bar.a
            _ = bar.b
            _ = bar.c
        }
        "#,
        r#"
        function $f() {
        @start
            %t1 =l alloc8 16
            storew 0, %t1
            %t2 =l add %t1, 4
            storew 0, %t2
            %t3 =l add %t1, 8
            storel 0, %t3

            %t4 =w loadw %t1
            %t5 =l add %t1, 4
            %t6 =w loadw %t5
            %t7 =l add %t1, 8
            %t8 =l loadl %t7

            %t9 =l alloc8 8
            storel 0, %t9

            %t10 =w loadw %t9
            %t11 =w loadw %t9
            %t12 =l loadl %t9

            ret
        }
        "#,
    );
}

#[test]
fn field_access_through_pointers_dereferences_implicitly() {
    assert_ir(
        r#"
        type Foo struct { a, b I32; c I64 }
        fn f() {
            var foo [Foo]
            _ = foo.a
            _ = foo.b
            _ = foo.c
        }
        "#,
        r#"
        function $f() {
        @start
            %t1 =l alloc8 8
            storel 0, %t1

            %t2 =l loadl %t1
            %t3 =w loadw %t2

            %t4 =l loadl %t1
            %t5 =l add %t4, 4
            %t6 =w loadw %t5

            %t7 =l loadl %t1
            %t8 =l add %t7, 8
            %t9 =l loadl %t8

            ret
        }
        "#,
    );
}

#[test]
fn aggregate_assignment_copies_with_blit() {
    assert_ir(
        r#"
        type Foo struct { a, b I32; c I64 }
        fn f() {
            var a, b Foo
            a = b
        }
        "#,
        r#"
        function $f() {
        @start
            %t1 =l alloc8 16
            storew 0, %t1
            %t2 =l add %t1, 4
            storew 0, %t2
            %t3 =l add %t1, 8
            storel 0, %t3

            %t4 =l alloc8 16
            storew 0, %t4
            %t5 =l add %t4, 4
            storew 0, %t5
            %t6 =l add %t4, 8
            storel 0, %t6

            blit %t4, %t1, 16

            ret
        }
        "#,
    );
}

#[test]
fn composite_return_values_feed_composite_arguments() {
    assert_ir(
        r#"
        type S struct { a, b I64 }
        fn make() S {
            var s S
            return s
        }
        fn take(_ S)
        fn f() {
            take(make())
        }
        "#,
        r#"
        type :l2 = { l 2 }
        function :l2 $make() {
        @start
            %t1 =l alloc8 16
            storel 0, %t1
            %t2 =l add %t1, 8
            storel 0, %t2
            ret %t1
        }
        function $f() {
        @start
            %t1 =:l2 call $make()
            call $take(:l2 %t1)
            ret
        }
        "#,
    );
}
